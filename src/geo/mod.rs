use dashmap::DashMap;
use uuid::Uuid;

use crate::models::user::{GeoPoint, Role, User};

const EARTH_RADIUS_KM: f64 = 6_371.0;

pub fn haversine_km(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let delta_lat = (b.lat - a.lat).to_radians();
    let delta_lng = (b.lng - a.lng).to_radians();

    let sin_lat = (delta_lat / 2.0).sin();
    let sin_lng = (delta_lng / 2.0).sin();

    let haversine = sin_lat * sin_lat + lat1.cos() * lat2.cos() * sin_lng * sin_lng;
    let central_angle = 2.0 * haversine.sqrt().asin();

    EARTH_RADIUS_KM * central_angle
}

/// Proximity query over the user directory: couriers within `radius_km`
/// of `center`. The caller filters out busy couriers separately.
pub fn nearby_couriers(
    users: &DashMap<Uuid, User>,
    center: GeoPoint,
    radius_km: f64,
) -> Vec<User> {
    users
        .iter()
        .filter_map(|entry| {
            let user = entry.value();
            if user.role == Role::Courier && haversine_km(&user.location, &center) <= radius_km {
                Some(user.clone())
            } else {
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use dashmap::DashMap;
    use uuid::Uuid;

    use super::{haversine_km, nearby_couriers};
    use crate::models::user::{GeoPoint, Role, User};

    fn courier(id_seed: u128, role: Role, lat: f64, lng: f64) -> User {
        User {
            id: Uuid::from_u128(id_seed),
            name: "test-user".to_string(),
            email: format!("u{id_seed}@example.com"),
            mobile: None,
            role,
            location: GeoPoint { lat, lng },
            socket_id: None,
            is_online: false,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn zero_distance_for_same_point() {
        let p = GeoPoint {
            lat: 53.5511,
            lng: 9.9937,
        };
        let distance = haversine_km(&p, &p);
        assert!(distance < 1e-9);
    }

    #[test]
    fn london_to_paris_is_around_343_km() {
        let london = GeoPoint {
            lat: 51.5074,
            lng: -0.1278,
        };
        let paris = GeoPoint {
            lat: 48.8566,
            lng: 2.3522,
        };
        let distance = haversine_km(&london, &paris);
        assert!((distance - 343.0).abs() < 5.0);
    }

    #[test]
    fn nearby_query_excludes_far_couriers_and_non_couriers() {
        let users = DashMap::new();
        let center = GeoPoint {
            lat: 12.97,
            lng: 77.59,
        };

        let near = courier(1, Role::Courier, 12.975, 77.595);
        let far = courier(2, Role::Courier, 13.06, 77.59);
        let customer = courier(3, Role::Customer, 12.97, 77.59);

        users.insert(near.id, near.clone());
        users.insert(far.id, far);
        users.insert(customer.id, customer);

        let found = nearby_couriers(&users, center, 5.0);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, near.id);
    }
}
