use time::{format_description::well_known::Rfc3339, OffsetDateTime, PrimitiveDateTime};

// Timestamps are stored naive; every value this service writes is UTC.

pub(crate) fn primitive_now_utc() -> PrimitiveDateTime {
    let now = OffsetDateTime::now_utc();
    PrimitiveDateTime::new(now.date(), now.time())
}

pub(crate) fn format_primitive(value: PrimitiveDateTime) -> String {
    let utc = value.assume_utc();
    utc.format(&Rfc3339).unwrap_or_else(|_| utc.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::{Date, Time};

    #[test]
    fn format_primitive_outputs_utc_z() {
        let date = Date::from_calendar_date(2025, time::Month::January, 2).unwrap();
        let time = Time::from_hms(10, 20, 30).unwrap();
        assert_eq!(format_primitive(PrimitiveDateTime::new(date, time)), "2025-01-02T10:20:30Z");
    }

    #[test]
    fn now_roundtrips_through_rfc3339() {
        let formatted = format_primitive(primitive_now_utc());
        assert!(formatted.ends_with('Z'), "expected UTC marker in {formatted}");
    }
}
