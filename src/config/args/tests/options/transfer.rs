#[cfg(test)]
mod tests {
    use crate::config::args::*;

    #[test]
    fn with_default_value() {
        init_dummy_tracing_subscriber();

        let args = vec![
            "s3-upload-agent",
            "--manifest-file",
            "./test_data/manifest/manifest.json",
            "s3://target-bucket/load1",
        ];

        let config = build_config_from_args(args).unwrap();

        assert_eq!(config.transfer_config.multipart_threshold, 50 * 1024 * 1024);
        assert_eq!(config.transfer_config.multipart_chunksize, 8 * 1024 * 1024);
    }

    #[test]
    fn with_custom_value() {
        init_dummy_tracing_subscriber();

        let args = vec![
            "s3-upload-agent",
            "--manifest-file",
            "./test_data/manifest/manifest.json",
            "--multipart-threshold",
            "20MiB",
            "--multipart-chunksize",
            "5MiB",
            "s3://target-bucket/load1",
        ];

        let config = build_config_from_args(args).unwrap();

        assert_eq!(config.transfer_config.multipart_threshold, 20 * 1024 * 1024);
        assert_eq!(config.transfer_config.multipart_chunksize, 5 * 1024 * 1024);
    }

    #[test]
    fn with_chunksize_larger_than_threshold() {
        init_dummy_tracing_subscriber();

        let args = vec![
            "s3-upload-agent",
            "--manifest-file",
            "./test_data/manifest/manifest.json",
            "--multipart-threshold",
            "20MiB",
            "--multipart-chunksize",
            "50MiB",
            "s3://target-bucket/load1",
        ];

        assert_eq!(
            build_config_from_args(args).unwrap_err(),
            MULTIPART_CHUNKSIZE_TOO_LARGE.to_string()
        );
    }

    #[test]
    fn with_out_of_range_value() {
        init_dummy_tracing_subscriber();

        let args = vec![
            "s3-upload-agent",
            "--manifest-file",
            "./test_data/manifest/manifest.json",
            "--multipart-chunksize",
            "4MiB",
            "s3://target-bucket/load1",
        ];

        assert!(build_config_from_args(args).is_err());
    }

    fn init_dummy_tracing_subscriber() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("dummy=trace")
            .try_init();
    }
}
