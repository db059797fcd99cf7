use chrono::{DateTime, Utc};
use mongodb::bson::DateTime as BsonDateTime;

pub fn chrono_to_bson(dt: DateTime<Utc>) -> BsonDateTime {
    BsonDateTime::from_millis(dt.timestamp_millis())
}

/// Whole minutes between two instants, clamped at zero
pub fn minutes_between(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    (end - start).num_minutes().max(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn minutes_between_clamps_negative() {
        let now = Utc::now();
        assert_eq!(minutes_between(now, now + Duration::minutes(12)), 12);
        assert_eq!(minutes_between(now, now - Duration::minutes(5)), 0);
    }
}
