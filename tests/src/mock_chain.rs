//! An in-memory chain client
//!
//! Contracts are not executed. The mock understands the proxy constructor,
//! the proxy admin and the role management calls well enough to let the
//! deployer observe its own effects, and counts every request it serves.

use std::{
    collections::{HashMap, HashSet},
    sync::Mutex,
};

use alloy::{
    primitives::{Address, Bytes, TxHash, B256},
    sol_types::{SolCall, SolValue},
};
use async_trait::async_trait;
use xc_deployer::{
    chain::ChainClient,
    errors::DeployError,
    types::{Deployment, Receipt},
};

use crate::{
    fixtures::PROXY_BYTECODE,
    solidity::{
        getProxyImplementationCall, grantRoleCall, hasRoleCall, ownerCall, revokeRoleCall,
        transferOwnershipCall, upgradeCall,
    },
};

/// The first byte of every address the mock assigns to a deployed contract
const DEPLOYED_ADDRESS_PREFIX: u8 = 0xc0;

/// A transaction sent to an existing contract
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SentTransaction {
    /// The target contract
    pub to: Address,
    /// The calldata
    pub data: Bytes,
}

#[derive(Default)]
struct ChainState {
    /// Number of contracts created so far
    deploy_count: u64,
    /// Number of transactions (creations included) so far, also the block height
    tx_count: u64,
    /// Number of read-only calls served
    call_count: usize,
    /// Number of receipt waits served
    wait_count: usize,
    /// The init code of every contract creation, in order
    deploys: Vec<(Address, Bytes)>,
    /// Every transaction sent to an existing contract, in order
    transactions: Vec<SentTransaction>,
    /// The block of every transaction
    blocks: HashMap<TxHash, u64>,
    /// Proxy -> implementation, as tracked by any proxy admin
    implementations: HashMap<Address, Address>,
    /// Proxy -> initializer data passed to its constructor
    init_data: HashMap<Address, Bytes>,
    /// Contract -> owner
    owners: HashMap<Address, Address>,
    /// (contract, role, account) grants
    roles: HashSet<(Address, B256, Address)>,
    /// Whether state-changing requests revert
    reverting: bool,
}

impl ChainState {
    /// Mint a transaction hash included in a fresh block
    fn next_tx(&mut self) -> TxHash {
        self.tx_count += 1;
        let tx_hash = TxHash::from(numbered::<32>(0xee, self.tx_count));
        self.blocks.insert(tx_hash, self.tx_count);
        tx_hash
    }
}

/// A [`ChainClient`] keeping its state in memory
pub struct MockChain {
    /// The address transactions are sent from
    sender: Address,
    /// The chain state
    state: Mutex<ChainState>,
}

impl MockChain {
    /// A fresh chain with no contracts
    pub fn new(sender: Address) -> Self {
        MockChain {
            sender,
            state: Mutex::new(ChainState::default()),
        }
    }

    /// The number of contract creations served
    pub fn deploy_count(&self) -> usize {
        self.state.lock().unwrap().deploys.len()
    }

    /// The number of transactions sent to existing contracts
    pub fn transaction_count(&self) -> usize {
        self.state.lock().unwrap().transactions.len()
    }

    /// The number of read-only calls served
    pub fn call_count(&self) -> usize {
        self.state.lock().unwrap().call_count
    }

    /// The number of requests of any kind served
    pub fn request_count(&self) -> usize {
        let state = self.state.lock().unwrap();
        state.deploys.len() + state.transactions.len() + state.call_count + state.wait_count
    }

    /// The transactions sent to existing contracts, in order
    pub fn transactions(&self) -> Vec<SentTransaction> {
        self.state.lock().unwrap().transactions.clone()
    }

    /// The addresses of the contracts created, in order
    pub fn deployed_addresses(&self) -> Vec<Address> {
        self.state.lock().unwrap().deploys.iter().map(|(addr, _)| *addr).collect()
    }

    /// The implementation a proxy admin reports for the proxy
    pub fn implementation_of(&self, proxy: Address) -> Option<Address> {
        self.state.lock().unwrap().implementations.get(&proxy).copied()
    }

    /// The initializer data the proxy was constructed with
    pub fn init_data_of(&self, proxy: Address) -> Option<Bytes> {
        self.state.lock().unwrap().init_data.get(&proxy).cloned()
    }

    /// Whether `account` holds `role` on `contract`
    pub fn has_role(&self, contract: Address, role: B256, account: Address) -> bool {
        self.state.lock().unwrap().roles.contains(&(contract, role, account))
    }

    /// Register a proxy deployed outside the run
    pub fn set_implementation(&self, proxy: Address, implementation: Address) {
        self.state.lock().unwrap().implementations.insert(proxy, implementation);
    }

    /// Set the owner of a contract
    pub fn set_owner(&self, contract: Address, owner: Address) {
        self.state.lock().unwrap().owners.insert(contract, owner);
    }

    /// Grant a role outside the run
    pub fn grant(&self, contract: Address, role: B256, account: Address) {
        self.state.lock().unwrap().roles.insert((contract, role, account));
    }

    /// Make every later creation and transaction revert
    pub fn revert_all(&self) {
        self.state.lock().unwrap().reverting = true;
    }
}

#[async_trait]
impl ChainClient for MockChain {
    fn sender(&self) -> Address {
        self.sender
    }

    async fn deploy(&self, init_code: Bytes) -> Result<Deployment, DeployError> {
        let mut state = self.state.lock().unwrap();
        if state.reverting {
            return Err(DeployError::ChainCall("contract creation reverted".to_string()));
        }

        state.deploy_count += 1;
        let address = Address::from(numbered::<20>(DEPLOYED_ADDRESS_PREFIX, state.deploy_count));
        let tx_hash = state.next_tx();

        if let Some(args) = init_code.strip_prefix(PROXY_BYTECODE.as_slice()) {
            let (implementation, _admin, data) =
                <(Address, Address, Bytes)>::abi_decode_params(args, true)
                    .map_err(|e| DeployError::ChainCall(e.to_string()))?;
            state.implementations.insert(address, implementation);
            state.init_data.insert(address, data);
        }

        state.deploys.push((address, init_code));
        Ok(Deployment { address, tx_hash })
    }

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, DeployError> {
        let mut state = self.state.lock().unwrap();
        state.call_count += 1;

        let selector: [u8; 4] = data
            .get(..4)
            .and_then(|s| s.try_into().ok())
            .ok_or_else(|| DeployError::ChainCall("missing selector".to_string()))?;
        let decode_err = |e: alloy::sol_types::Error| DeployError::ChainCall(e.to_string());

        match selector {
            getProxyImplementationCall::SELECTOR => {
                let call = getProxyImplementationCall::abi_decode(&data, true).map_err(decode_err)?;
                let implementation = state
                    .implementations
                    .get(&call.proxy)
                    .copied()
                    .ok_or_else(|| DeployError::ChainCall(format!("{} is not a proxy", call.proxy)))?;
                Ok(getProxyImplementationCall::abi_encode_returns(&(implementation,)).into())
            }
            ownerCall::SELECTOR => {
                let owner = state.owners.get(&to).copied().unwrap_or(self.sender);
                Ok(ownerCall::abi_encode_returns(&(owner,)).into())
            }
            hasRoleCall::SELECTOR => {
                let call = hasRoleCall::abi_decode(&data, true).map_err(decode_err)?;
                let granted = state.roles.contains(&(to, call.role, call.account));
                Ok(hasRoleCall::abi_encode_returns(&(granted,)).into())
            }
            _ => Err(DeployError::ChainCall(format!("unknown call to {to}"))),
        }
    }

    async fn send_transaction(&self, to: Address, data: Bytes) -> Result<TxHash, DeployError> {
        let mut state = self.state.lock().unwrap();
        if state.reverting {
            return Err(DeployError::ChainCall("transaction reverted".to_string()));
        }

        let selector: [u8; 4] = data
            .get(..4)
            .and_then(|s| s.try_into().ok())
            .ok_or_else(|| DeployError::ChainCall("missing selector".to_string()))?;
        let decode_err = |e: alloy::sol_types::Error| DeployError::ChainCall(e.to_string());

        match selector {
            upgradeCall::SELECTOR => {
                let call = upgradeCall::abi_decode(&data, true).map_err(decode_err)?;
                state.implementations.insert(call.proxy, call.implementation);
            }
            transferOwnershipCall::SELECTOR => {
                let call = transferOwnershipCall::abi_decode(&data, true).map_err(decode_err)?;
                state.owners.insert(to, call.newOwner);
            }
            grantRoleCall::SELECTOR => {
                let call = grantRoleCall::abi_decode(&data, true).map_err(decode_err)?;
                state.roles.insert((to, call.role, call.account));
            }
            revokeRoleCall::SELECTOR => {
                let call = revokeRoleCall::abi_decode(&data, true).map_err(decode_err)?;
                state.roles.remove(&(to, call.role, call.account));
            }
            _ => return Err(DeployError::ChainCall(format!("unknown transaction to {to}"))),
        }

        state.transactions.push(SentTransaction { to, data });
        Ok(state.next_tx())
    }

    async fn wait(&self, tx_hash: TxHash, _confirmations: u64) -> Result<Receipt, DeployError> {
        let mut state = self.state.lock().unwrap();
        state.wait_count += 1;

        let block_number = state
            .blocks
            .get(&tx_hash)
            .copied()
            .ok_or_else(|| DeployError::ChainCall(format!("unknown transaction {tx_hash}")))?;
        Ok(Receipt {
            tx_hash,
            block_number,
        })
    }
}

/// `N` bytes starting with `prefix` and ending with `n`
fn numbered<const N: usize>(prefix: u8, n: u64) -> [u8; N] {
    let mut bytes = [0u8; N];
    bytes[0] = prefix;
    bytes[N - 8..].copy_from_slice(&n.to_be_bytes());
    bytes
}
