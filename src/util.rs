pub fn format_elapsed(seconds: u64) -> String {
    let minutes = seconds / 60;
    let rest = seconds % 60;

    format!("{} min {:02} s", minutes, rest)
}

pub fn format_distance(km: f64) -> String {
    format!("{:.2} km", km)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(0), "0 min 00 s");
        assert_eq!(format_elapsed(65), "1 min 05 s");
        assert_eq!(format_elapsed(3661), "61 min 01 s");
    }

    #[test]
    fn test_format_elapsed_boundaries() {
        assert_eq!(format_elapsed(9), "0 min 09 s");
        assert_eq!(format_elapsed(59), "0 min 59 s");
        assert_eq!(format_elapsed(60), "1 min 00 s");
        assert_eq!(format_elapsed(600), "10 min 00 s");
    }

    #[test]
    fn test_format_distance() {
        assert_eq!(format_distance(0.0), "0.00 km");
        assert_eq!(format_distance(1.234), "1.23 km");
        assert_eq!(format_distance(150.0), "150.00 km");
    }

    #[test]
    fn test_format_distance_rounds() {
        assert_eq!(format_distance(0.005_1), "0.01 km");
        assert_eq!(format_distance(2.999), "3.00 km");
    }
}
