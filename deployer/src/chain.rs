//! The chain client capability consumed by the deployer, and its `alloy` implementation

use std::{str::FromStr, time::Duration};

use alloy::{
    network::{EthereumWallet, TransactionBuilder},
    primitives::{Address, Bytes, TxHash},
    providers::{Provider, ProviderBuilder},
    rpc::types::{TransactionReceipt, TransactionRequest},
    signers::local::PrivateKeySigner,
    sol_types::SolCall,
};
use async_trait::async_trait;
use tracing::debug;

use crate::{
    constants::RECEIPT_POLL_INTERVAL_MS,
    errors::DeployError,
    types::{Deployment, Receipt},
};

/// Executes deploy and call transactions against one network
///
/// Timeouts and cancellation belong to the implementation; the deployer
/// waits on every future it is handed.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// The account that signs transactions
    fn sender(&self) -> Address;

    /// Broadcast a contract creation with the given init code and wait for
    /// it to be mined
    async fn deploy(&self, init_code: Bytes) -> Result<Deployment, DeployError>;

    /// Execute a read-only call
    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, DeployError>;

    /// Broadcast a state-changing call
    async fn send_transaction(&self, to: Address, data: Bytes) -> Result<TxHash, DeployError>;

    /// Wait until the transaction has the given number of confirmations
    async fn wait(&self, tx_hash: TxHash, confirmations: u64) -> Result<Receipt, DeployError>;
}

/// Typed helpers over the raw [`ChainClient`] calls
#[async_trait]
pub trait ChainClientExt: ChainClient {
    /// Execute a read-only call and decode its return value
    async fn call_sol<C: SolCall + Send + Sync>(
        &self,
        to: Address,
        call: C,
    ) -> Result<C::Return, DeployError> {
        let ret = self.call(to, call.abi_encode().into()).await?;
        C::abi_decode_returns(&ret, true /* validate */)
            .map_err(|e| DeployError::ChainCall(format!("decoding {}: {e}", C::SIGNATURE)))
    }

    /// Send a state-changing call and wait for its confirmation
    async fn send_sol<C: SolCall + Send + Sync>(
        &self,
        to: Address,
        call: C,
        confirmations: u64,
    ) -> Result<Receipt, DeployError> {
        let tx_hash = self.send_transaction(to, call.abi_encode().into()).await?;
        debug!(signature = C::SIGNATURE, %to, %tx_hash, "pending");
        self.wait(tx_hash, confirmations).await
    }
}

impl<T: ChainClient + ?Sized> ChainClientExt for T {}

// ---------
// | Alloy |
// ---------

/// A [`ChainClient`] backed by an `alloy` provider with a local signer
pub struct AlloyChainClient<P> {
    /// The signing provider
    provider: P,
    /// The signer's address
    sender: Address,
}

/// Sets up a signing HTTP client from a private key and an RPC url
pub fn setup_client(
    priv_key: &str,
    rpc_url: &str,
) -> Result<AlloyChainClient<impl Provider + Clone>, DeployError> {
    let signer = PrivateKeySigner::from_str(priv_key)
        .map_err(|e| DeployError::ClientInitialization(e.to_string()))?;
    let url = rpc_url
        .parse()
        .map_err(|e| DeployError::ClientInitialization(format!("{rpc_url}: {e}")))?;

    let sender = signer.address();
    let provider = ProviderBuilder::new()
        .wallet(EthereumWallet::from(signer))
        .on_http(url);

    Ok(AlloyChainClient { provider, sender })
}

impl<P: Provider> AlloyChainClient<P> {
    /// Poll for a receipt until the transaction is mined
    async fn poll_receipt(&self, tx_hash: TxHash) -> Result<TransactionReceipt, DeployError> {
        loop {
            let receipt = self
                .provider
                .get_transaction_receipt(tx_hash)
                .await
                .map_err(|e| DeployError::ChainCall(e.to_string()))?;
            if let Some(receipt) = receipt {
                return Ok(receipt);
            }

            tokio::time::sleep(Duration::from_millis(RECEIPT_POLL_INTERVAL_MS)).await;
        }
    }
}

/// Extract the block number from a successful receipt
fn check_receipt(receipt: &TransactionReceipt) -> Result<u64, DeployError> {
    if !receipt.status() {
        return Err(DeployError::ChainCall(format!(
            "transaction {} reverted",
            receipt.transaction_hash
        )));
    }

    receipt.block_number.ok_or_else(|| {
        DeployError::ChainCall(format!("transaction {} has no block", receipt.transaction_hash))
    })
}

#[async_trait]
impl<P: Provider + Send + Sync> ChainClient for AlloyChainClient<P> {
    fn sender(&self) -> Address {
        self.sender
    }

    async fn deploy(&self, init_code: Bytes) -> Result<Deployment, DeployError> {
        let tx = TransactionRequest::default()
            .with_from(self.sender)
            .with_deploy_code(init_code);
        let pending = self
            .provider
            .send_transaction(tx)
            .await
            .map_err(|e| DeployError::ChainCall(e.to_string()))?;
        let tx_hash = *pending.tx_hash();
        debug!(%tx_hash, "pending deployment");

        let receipt = self.poll_receipt(tx_hash).await?;
        check_receipt(&receipt)?;
        let address = receipt.contract_address.ok_or_else(|| {
            DeployError::ChainCall(format!("transaction {tx_hash} created no contract"))
        })?;

        Ok(Deployment { address, tx_hash })
    }

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, DeployError> {
        let tx = TransactionRequest::default()
            .with_from(self.sender)
            .with_to(to)
            .with_input(data);
        self.provider
            .call(&tx)
            .await
            .map_err(|e| DeployError::ChainCall(e.to_string()))
    }

    async fn send_transaction(&self, to: Address, data: Bytes) -> Result<TxHash, DeployError> {
        let tx = TransactionRequest::default()
            .with_from(self.sender)
            .with_to(to)
            .with_input(data);
        let pending = self
            .provider
            .send_transaction(tx)
            .await
            .map_err(|e| DeployError::ChainCall(e.to_string()))?;

        Ok(*pending.tx_hash())
    }

    async fn wait(&self, tx_hash: TxHash, confirmations: u64) -> Result<Receipt, DeployError> {
        let receipt = self.poll_receipt(tx_hash).await?;
        let block_number = check_receipt(&receipt)?;

        // A transaction has one confirmation once it is mined
        let target = block_number + confirmations.saturating_sub(1);
        loop {
            let head = self
                .provider
                .get_block_number()
                .await
                .map_err(|e| DeployError::ChainCall(e.to_string()))?;
            if head >= target {
                break;
            }

            tokio::time::sleep(Duration::from_millis(RECEIPT_POLL_INTERVAL_MS)).await;
        }

        Ok(Receipt {
            tx_hash,
            block_number,
        })
    }
}
