use std::{sync::Arc, time::Duration};

use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use anyhow::Context;
use log::{debug, warn};
use serde_json::json;
use url::Url;

use crate::{
    config::RpcSettings,
    error::SyncError,
    rpc::{governor::RateGovernor, types::RawLog, ChainSource},
};

/// JSON-RPC client for the two chain reads the sync engine needs.
///
/// Each method issues exactly one request, admitted through the shared
/// [`RateGovernor`]. Transport failures and JSON-RPC error envelopes both
/// surface as [`SyncError::ChainUnavailable`].
#[derive(Clone)]
pub struct ChainClient {
    provider: DynProvider,
    contract_address: String,
    governor: Arc<RateGovernor>,
    request_timeout: Duration,
}

impl ChainClient {
    pub fn new(settings: &RpcSettings, governor: Arc<RateGovernor>) -> anyhow::Result<Self> {
        let url = Url::parse(&settings.url).context("Invalid RPC URL")?;

        let client = ProviderBuilder::new().connect_http(url);

        Ok(Self::with_provider(
            DynProvider::new(client),
            &settings.contract_address,
            governor,
            Duration::from_secs(settings.request_timeout_secs),
        ))
    }

    pub fn with_provider(
        provider: DynProvider,
        contract_address: &str,
        governor: Arc<RateGovernor>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            provider,
            contract_address: contract_address.to_lowercase(),
            governor,
            request_timeout,
        }
    }

    async fn call<T>(
        &self,
        method: &'static str,
        request: impl std::future::Future<Output = Result<T, SyncError>>,
    ) -> Result<T, SyncError> {
        self.governor.admit().await;

        match tokio::time::timeout(self.request_timeout, request).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                warn!("[RPC] {} failed: {}", method, e);
                Err(e)
            },
            Err(_) => {
                warn!("[RPC] {} timed out after {:?}", method, self.request_timeout);
                Err(SyncError::ChainUnavailable(format!(
                    "{} timed out after {:?}",
                    method, self.request_timeout
                )))
            },
        }
    }
}

impl ChainSource for ChainClient {
    async fn current_height(&self) -> Result<u64, SyncError> {
        self.call("eth_blockNumber", async {
            let height = self.provider.get_block_number().await?;
            Ok::<_, SyncError>(height)
        })
        .await
    }

    async fn logs_in_range(&self, from_block: u64, to_block: u64) -> Result<Vec<RawLog>, SyncError> {
        let filter = json!({
            "address": self.contract_address,
            "fromBlock": format!("0x{:x}", from_block),
            "toBlock": format!("0x{:x}", to_block),
            "topics": [],
        });

        let logs = self
            .call("eth_getLogs", async {
                let logs: Vec<RawLog> = self
                    .provider
                    .raw_request("eth_getLogs".into(), (filter,))
                    .await?;
                Ok::<_, SyncError>(logs)
            })
            .await?;

        debug!(
            "[RPC] eth_getLogs [{}, {}] returned {} logs",
            from_block,
            to_block,
            logs.len()
        );

        Ok(logs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::{primitives::U64, transports::mock::Asserter};

    const CONTRACT: &str = "0x0000000000000000000000000000000000001000";

    fn mocked_client(governor: Arc<RateGovernor>) -> (ChainClient, Asserter) {
        let asserter = Asserter::new();
        let provider = ProviderBuilder::new().connect_mocked_client(asserter.clone());
        let client = ChainClient::with_provider(
            DynProvider::new(provider),
            CONTRACT,
            governor,
            Duration::from_secs(5),
        );
        (client, asserter)
    }

    #[tokio::test]
    async fn test_error_response_is_chain_unavailable() {
        let governor = Arc::new(RateGovernor::new(80));
        let (client, asserter) = mocked_client(governor.clone());

        asserter.push_failure_msg("internal error");
        let result = client.current_height().await;

        assert!(matches!(result, Err(SyncError::ChainUnavailable(_))));
        assert_eq!(governor.calls_in_window().await, 1);
    }

    #[tokio::test]
    async fn test_every_call_is_admitted() {
        let governor = Arc::new(RateGovernor::new(80));
        let (client, asserter) = mocked_client(governor.clone());

        asserter.push_success(&U64::from(1_234));
        assert_eq!(client.current_height().await.unwrap(), 1_234);
        assert_eq!(governor.calls_in_window().await, 1);

        asserter.push_success(&Vec::<serde_json::Value>::new());
        assert!(client.logs_in_range(1, 100).await.unwrap().is_empty());
        assert_eq!(governor.calls_in_window().await, 2);

        asserter.push_failure_msg("limit exceeded");
        assert!(client.logs_in_range(101, 200).await.unwrap_err().is_chain());
        assert_eq!(governor.calls_in_window().await, 3);
    }
}
