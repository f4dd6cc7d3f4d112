use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// Stack directory living for the duration of a test
pub struct TestStack {
    pub root: TempDir,
}

impl TestStack {
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        Self { root }
    }

    pub fn write_stack(&self, content: &str) -> PathBuf {
        let path = self.root.path().join("stack.kdl");
        fs::write(&path, content).unwrap();
        path
    }

    pub fn write_env(&self, content: &str) {
        fs::write(self.root.path().join(".env"), content).unwrap();
    }

    #[allow(dead_code)]
    pub fn write_file(&self, name: &str, content: &str) -> PathBuf {
        let path = self.root.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    pub fn path(&self) -> PathBuf {
        self.root.path().to_path_buf()
    }
}

pub const ENV: &str = "\
VPC_ID=vpc-0abc
AVAILABILITY_ZONES=eu-west-1a,eu-west-1b
PRIVATE_SUBNET_IDS=subnet-a,subnet-b
DB_IDENTIFIER=payments-db
DB_ENDPOINT=payments-db.abc.eu-west-1.rds.amazonaws.com
DB_PORT=5432
";

pub const STACK: &str = r#"
stack "payments-proxy"

network "Vpc" lookup="explicit" {
    vpc-id env="VPC_ID"
    availability-zones env-list="AVAILABILITY_ZONES"
    subnet-ids env-list="PRIVATE_SUBNET_IDS"
}

database "Database" lookup="explicit" {
    instance-identifier env="DB_IDENTIFIER"
    endpoint-address env="DB_ENDPOINT"
    port env="DB_PORT"
    engine "postgres"
}

secret "DbSecret" {
    secret-name "payments-db-secret"
    generate {
        username "proxy_user"
    }
}

role "ProxyRole" {
    assumed-by "rds.amazonaws.com"
}

policy "ProxySecretAccess" {
    roles {
        ref "ProxyRole.roleName"
    }
    actions "secretsmanager:GetSecretValue"
    resources {
        ref "DbSecret.arn"
    }
}

proxy "Proxy" {
    name "payments-rds-proxy"
    role ref="ProxyRole.arn"
    vpc-subnets ref="Vpc.subnetIds"
    secrets {
        ref "DbSecret.arn"
    }
    target "Database"
}
"#;

/// Environment keys the stacks read; cleared so the host cannot leak in
#[allow(dead_code)]
pub const STACK_KEYS: [&str; 8] = [
    "VPC_ID",
    "AVAILABILITY_ZONES",
    "PRIVATE_SUBNET_IDS",
    "DB_IDENTIFIER",
    "DB_ENDPOINT",
    "DB_PORT",
    "PROXYFLOW_STACK_PATH",
    "PROXYFLOW_ENV_FILE",
];
