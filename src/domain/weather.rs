use folio_api_types::HumidityBand;

const UNKNOWN_CONDITION: &str = "Unknown";

/// WMO weather interpretation codes as reported by Open-Meteo.
const CONDITIONS: &[(i64, &str)] = &[
    (0, "Clear Sky"),
    (1, "Mainly Clear"),
    (2, "Partly Cloudy"),
    (3, "Overcast"),
    (45, "Fog"),
    (48, "Depositing Rime Fog"),
    (51, "Light Drizzle"),
    (53, "Moderate Drizzle"),
    (55, "Dense Drizzle"),
    (56, "Light Freezing Drizzle"),
    (57, "Dense Freezing Drizzle"),
    (61, "Slight Rain"),
    (63, "Moderate Rain"),
    (65, "Heavy Rain"),
    (66, "Light Freezing Rain"),
    (67, "Heavy Freezing Rain"),
    (71, "Slight Snow Fall"),
    (73, "Moderate Snow Fall"),
    (75, "Heavy Snow Fall"),
    (77, "Snow Grains"),
    (80, "Slight Rain Showers"),
    (81, "Moderate Rain Showers"),
    (82, "Violent Rain Showers"),
    (85, "Slight Snow Showers"),
    (86, "Heavy Snow Showers"),
    (95, "Thunderstorm"),
    (96, "Thunderstorm with Slight Hail"),
    (99, "Thunderstorm with Heavy Hail"),
];

/// Map a weather code to its human-readable condition, `"Unknown"` when unmapped.
pub fn condition_for_code(code: i64) -> &'static str {
    CONDITIONS
        .iter()
        .find(|(candidate, _)| *candidate == code)
        .map(|(_, label)| *label)
        .unwrap_or(UNKNOWN_CONDITION)
}

/// Clamp a fractional humidity reading into a percentage and classify it.
pub fn classify_humidity(raw: f64) -> (u8, HumidityBand) {
    let percent = clamp_percent(raw);
    (percent, HumidityBand::classify(percent))
}

pub fn clamp_percent(raw: f64) -> u8 {
    if raw.is_nan() {
        return 0;
    }
    raw.round().clamp(0.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_codes_map_to_labels() {
        assert_eq!(condition_for_code(0), "Clear Sky");
        assert_eq!(condition_for_code(2), "Partly Cloudy");
        assert_eq!(condition_for_code(48), "Depositing Rime Fog");
        assert_eq!(condition_for_code(82), "Violent Rain Showers");
        assert_eq!(condition_for_code(99), "Thunderstorm with Heavy Hail");
    }

    #[test]
    fn unmapped_codes_are_unknown() {
        for code in [999, -1, 4, 100] {
            assert_eq!(condition_for_code(code), "Unknown", "code {code}");
        }
    }

    #[test]
    fn table_has_twenty_eight_unique_codes() {
        let mut codes: Vec<_> = CONDITIONS.iter().map(|(code, _)| *code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), 28);
    }

    #[test]
    fn humidity_readings_round_and_clamp() {
        assert_eq!(classify_humidity(30.4), (30, HumidityBand::Dry));
        assert_eq!(classify_humidity(30.6), (31, HumidityBand::Comfortable));
        assert_eq!(classify_humidity(120.0), (100, HumidityBand::Muggy));
        assert_eq!(classify_humidity(-5.0), (0, HumidityBand::Dry));
        assert_eq!(classify_humidity(f64::NAN), (0, HumidityBand::Dry));
    }
}
