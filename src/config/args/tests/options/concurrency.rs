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

        assert_eq!(config.io_concurrency, 16);
        assert_eq!(config.network_concurrency, 100);
        assert_eq!(config.queue_capacity, 200);
        assert_eq!(
            config
                .target_client_config
                .parallel_upload_semaphore
                .available_permits(),
            100
        );
    }

    #[test]
    fn with_custom_value() {
        init_dummy_tracing_subscriber();

        let args = vec![
            "s3-upload-agent",
            "--manifest-file",
            "./test_data/manifest/manifest.json",
            "--io-concurrency",
            "8",
            "--network-concurrency",
            "4",
            "s3://target-bucket/load1",
        ];

        let config = build_config_from_args(args).unwrap();

        assert_eq!(config.io_concurrency, 8);
        assert_eq!(config.network_concurrency, 4);
        assert_eq!(config.queue_capacity, 16);
        assert_eq!(
            config
                .target_client_config
                .parallel_upload_semaphore
                .available_permits(),
            4
        );

        let args = vec![
            "s3-upload-agent",
            "--manifest-file",
            "./test_data/manifest/manifest.json",
            "--io-concurrency",
            "8",
            "--network-concurrency",
            "4",
            "--queue-capacity",
            "8",
            "--max-pool-connections",
            "10",
            "s3://target-bucket/load1",
        ];

        let config = build_config_from_args(args).unwrap();

        assert_eq!(config.queue_capacity, 8);
        assert_eq!(
            config
                .target_client_config
                .parallel_upload_semaphore
                .available_permits(),
            10
        );
    }

    #[test]
    fn queue_capacity_too_small() {
        init_dummy_tracing_subscriber();

        let args = vec![
            "s3-upload-agent",
            "--manifest-file",
            "./test_data/manifest/manifest.json",
            "--io-concurrency",
            "8",
            "--network-concurrency",
            "4",
            "--queue-capacity",
            "7",
            "s3://target-bucket/load1",
        ];

        assert_eq!(
            build_config_from_args(args).unwrap_err(),
            QUEUE_CAPACITY_TOO_SMALL.to_string()
        );
    }

    #[test]
    fn max_pool_connections_too_small() {
        init_dummy_tracing_subscriber();

        let args = vec![
            "s3-upload-agent",
            "--manifest-file",
            "./test_data/manifest/manifest.json",
            "--network-concurrency",
            "20",
            "--max-pool-connections",
            "10",
            "s3://target-bucket/load1",
        ];

        assert_eq!(
            build_config_from_args(args).unwrap_err(),
            MAX_POOL_CONNECTIONS_TOO_SMALL.to_string()
        );
    }

    #[test]
    fn zero_concurrency() {
        init_dummy_tracing_subscriber();

        let args = vec![
            "s3-upload-agent",
            "--manifest-file",
            "./test_data/manifest/manifest.json",
            "--io-concurrency",
            "0",
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
