//! AWS SDK client construction (spec.md §4.6): every adapter points at the
//! LocalStack endpoint discovered at startup, built the same way the
//! teacher's `compiler::s3::create_s3_client` builds its S3 client against
//! a configurable endpoint.

use aws_sdk_cloudwatchlogs::Client as CloudWatchLogsClient;
use aws_sdk_iam::Client as IamClient;
use aws_sdk_s3::Client as S3Client;
use aws_sdk_s3::config::Region;
use aws_sdk_secretsmanager::Client as SecretsManagerClient;
use aws_sdk_ssm::Client as SsmClient;

/// Bundle of adapter clients, all pointed at the same LocalStack endpoint.
#[derive(Clone)]
pub struct AwsClients {
    pub ssm: SsmClient,
    pub secretsmanager: SecretsManagerClient,
    pub cloudwatch_logs: CloudWatchLogsClient,
    pub iam: IamClient,
    pub s3: S3Client,
}

impl AwsClients {
    pub async fn new(region: &str, localstack_endpoint: &str) -> Self {
        let shared = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .endpoint_url(localstack_endpoint)
            .load()
            .await;

        // S3 against LocalStack needs path-style addressing; the other
        // services don't distinguish virtual-hosted vs path style.
        let s3_config = aws_sdk_s3::config::Builder::from(&shared)
            .force_path_style(true)
            .build();

        AwsClients {
            ssm: SsmClient::new(&shared),
            secretsmanager: SecretsManagerClient::new(&shared),
            cloudwatch_logs: CloudWatchLogsClient::new(&shared),
            iam: IamClient::new(&shared),
            s3: S3Client::from_conf(s3_config),
        }
    }
}
