//! Punch sources: the attendance terminal and offline dump files.

use crate::config::DeviceConfig;
use crate::error::{AppError, Result};
use crate::models::{DeviceUser, RawPunch, UserDirectory};
use crate::zk_tcp::{ConnectionDiagnosis, ZkTcpClient, parser};
use std::future::Future;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Supplier of raw punches and the user directory.
pub trait PunchSource {
    /// Every punch the source holds.
    fn fetch_punches(&self) -> impl Future<Output = Result<Vec<RawPunch>>> + Send;

    /// User id to display name.
    fn fetch_user_directory(&self) -> impl Future<Output = Result<UserDirectory>> + Send;
}

/// Reads from a ZKTeco terminal over the binary TCP protocol.
///
/// Every fetch is one session: connect, disable the keypad, read, re-enable,
/// disconnect. The device is released whether the read succeeds or not.
#[derive(Debug, Clone)]
pub struct DeviceSource {
    config: DeviceConfig,
}

impl DeviceSource {
    pub fn new(config: DeviceConfig) -> Self {
        Self { config }
    }

    fn client(&self) -> ZkTcpClient {
        ZkTcpClient::new(&self.config.ip, self.config.port, self.config.timeout_secs)
            .with_password(self.config.password)
    }

    /// Connect and lock the device. Leaves nothing open on failure.
    async fn open(&self) -> Result<ZkTcpClient> {
        let mut client = self.client();
        client.connect().await?;

        if let Err(e) = client.disable_device().await {
            warn!("Could not disable device: {e}");
            if let Err(e) = client.disconnect().await {
                warn!("Disconnect failed: {e}");
            }
            return Err(e);
        }

        Ok(client)
    }

    /// Unlock the device and end the session. Failures are logged only.
    async fn release(client: &mut ZkTcpClient) {
        if let Err(e) = client.enable_device().await {
            warn!("Could not re-enable device: {e}");
        }
        if let Err(e) = client.disconnect().await {
            warn!("Disconnect failed: {e}");
        }
    }

    /// Download the user table.
    pub async fn users(&self) -> Result<Vec<DeviceUser>> {
        let mut client = self.open().await?;

        let result = async {
            let capacity = client.get_capacity().await?;
            client.read_users(Some(capacity.users)).await
        }
        .await;

        Self::release(&mut client).await;
        result
    }

    /// Play the "thank you" voice prompt.
    pub async fn announce(&self) -> Result<()> {
        let mut client = self.client();
        client.connect().await?;
        let result = client.test_voice(0).await;
        if let Err(e) = client.disconnect().await {
            warn!("Disconnect failed: {e}");
        }
        result
    }

    /// Check TCP reachability and the protocol handshake.
    pub async fn diagnose(&self) -> ConnectionDiagnosis {
        self.client().diagnose_connection().await
    }
}

impl PunchSource for DeviceSource {
    async fn fetch_punches(&self) -> Result<Vec<RawPunch>> {
        let mut client = self.open().await?;

        let result = async {
            let capacity = client.get_capacity().await?;
            // Older firmware records only the slot number, so the user table comes first
            let users = client.read_users(Some(capacity.users)).await?;
            client.read_attendance(Some(capacity.records), &users).await
        }
        .await;

        Self::release(&mut client).await;
        result
    }

    async fn fetch_user_directory(&self) -> Result<UserDirectory> {
        let users = self.users().await?;
        Ok(UserDirectory::from_users(&users))
    }
}

/// Reads an exported ATTLOG text dump and an optional users CSV.
///
/// The users file has `user_id,name` columns; `uid`, `privilege` and `card`
/// columns are accepted but optional.
#[derive(Debug, Clone)]
pub struct FileSource {
    attlog: PathBuf,
    users: Option<PathBuf>,
}

impl FileSource {
    pub fn new(attlog: impl Into<PathBuf>, users: Option<PathBuf>) -> Self {
        Self {
            attlog: attlog.into(),
            users,
        }
    }

    fn read_users(path: &Path) -> Result<Vec<DeviceUser>> {
        let file = std::fs::File::open(path)
            .map_err(|e| AppError::SourceUnavailable(format!("Cannot open users file {}: {e}", path.display())))?;
        let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(file);
        let users = reader.deserialize().collect::<std::result::Result<Vec<DeviceUser>, _>>()?;
        info!("Read {} users from {}", users.len(), path.display());
        Ok(users)
    }
}

impl PunchSource for FileSource {
    async fn fetch_punches(&self) -> Result<Vec<RawPunch>> {
        let data = tokio::fs::read(&self.attlog).await.map_err(|e| {
            AppError::SourceUnavailable(format!("Cannot read attendance log {}: {e}", self.attlog.display()))
        })?;
        let punches = parser::parse_text_format(&data);
        info!("Read {} punches from {}", punches.len(), self.attlog.display());
        Ok(punches)
    }

    async fn fetch_user_directory(&self) -> Result<UserDirectory> {
        match &self.users {
            Some(path) => {
                let path = path.clone();
                let users = tokio::task::spawn_blocking(move || Self::read_users(&path))
                    .await
                    .map_err(|e| AppError::parse(format!("Task join error: {e}")))??;
                Ok(UserDirectory::from_users(&users))
            }
            None => Ok(UserDirectory::new()),
        }
    }
}
