use byte_unit::Byte;
use std::str::FromStr;

const UNDER_MIN_VALUE: &str = "must be greater than or equal to 5MiB";
const OVER_MAX_VALUE: &str = "must be smaller than or equal to 5GiB";

const MIN_VALUE: u128 = 5 * 1024 * 1024;
const MAX_VALUE: u128 = 5 * 1024 * 1024 * 1024;

pub fn check_human_bytes(value: &str) -> Result<String, String> {
    let result = Byte::from_str(value).map_err(|e| e.to_string())?;

    if result.as_u128() < MIN_VALUE {
        return Err(UNDER_MIN_VALUE.to_string());
    }
    if result.as_u128() > MAX_VALUE {
        return Err(OVER_MAX_VALUE.to_string());
    }

    Ok(value.to_string())
}

pub fn parse_human_bytes(value: &str) -> Result<u64, String> {
    check_human_bytes(value)?;

    let result = Byte::from_str(value).map_err(|e| e.to_string())?;
    u64::try_from(result.as_u128()).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_valid_value() {
        init_dummy_tracing_subscriber();

        check_human_bytes("5MiB").unwrap();
        check_human_bytes("5242880").unwrap();
        check_human_bytes("5GiB").unwrap();
        check_human_bytes("5368709120").unwrap();
        check_human_bytes("8MiB").unwrap();
        check_human_bytes("50MiB").unwrap();
    }

    #[test]
    fn parse_valid_value() {
        init_dummy_tracing_subscriber();

        assert_eq!(parse_human_bytes("8MiB").unwrap(), 8 * 1024 * 1024);
        assert_eq!(parse_human_bytes("50MiB").unwrap(), 50 * 1024 * 1024);
        assert_eq!(parse_human_bytes("5242880").unwrap(), 5242880);
    }

    #[test]
    fn check_invalid_value() {
        init_dummy_tracing_subscriber();

        let result = check_human_bytes("524287a");
        assert!(result.is_err());

        let result = check_human_bytes("5Zib");
        assert!(result.is_err());
    }

    #[test]
    fn check_under_min_value() {
        init_dummy_tracing_subscriber();

        let result = check_human_bytes("5242879");
        assert!(result.is_err());

        if let Err(e) = result {
            assert_eq!(e, UNDER_MIN_VALUE);
        }
    }

    #[test]
    fn check_over_max_value() {
        init_dummy_tracing_subscriber();

        let result = check_human_bytes("5368709121");
        assert!(result.is_err());

        if let Err(e) = result {
            assert_eq!(e, OVER_MAX_VALUE);
        }

        let result = parse_human_bytes("5Eib");
        assert!(result.is_err());
    }

    fn init_dummy_tracing_subscriber() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("dummy=trace")
            .try_init();
    }
}
