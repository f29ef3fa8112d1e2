//! Constants used in the deploy scripts

use alloy::primitives::{b256, B256};

/// The name of the proxy contract artifact deployed in front of implementations
pub const DEFAULT_PROXY_CONTRACT: &str = "XCUpgradeableProxy";

/// The name of the function invoked through the proxy constructor to
/// initialize an implementation
pub const INITIALIZER_FN: &str = "initialize";

/// The number of confirmations to wait for a contract deployment or a
/// state-changing transaction
pub const NUM_DEPLOY_CONFIRMATIONS: u64 = 1;

/// The `DEFAULT_ADMIN_ROLE` of OpenZeppelin's `AccessControl`, i.e. the super admin
pub const DEFAULT_ADMIN_ROLE: B256 = B256::ZERO;

/// `keccak256("ADMIN_ROLE")`
pub const ADMIN_ROLE: B256 =
    b256!("a49807205ce4d355092ef5a8a18f56e8913cf4a201fbe287825b095693c21775");

/// The suffix of the per-environment record file,
/// i.e. `<script>-<environment>-config.json`
pub const RECORD_FILE_SUFFIX: &str = "config.json";

/// The directory, relative to the records, in which contract ABIs are exported
pub const ABI_EXPORT_DIR: &str = "contract_abi";

/// The block number written for contracts that were linked rather than deployed
pub const LINKED_BLOCK: &str = "0";

/// The extension of artifact, ABI and storage layout files
pub const JSON_EXTENSION: &str = "json";

/// Network name prefixes stripped when deriving the environment name
pub const NETWORK_PREFIXES: [&str; 2] = ["eth_", "base_"];

/// The name of the in-process Hardhat network
pub const HARDHAT_NETWORK: &str = "hardhat";

/// The environment name used for the in-process Hardhat network
pub const LOCALHOST_ENVIRONMENT: &str = "localhost";

/// The prefix of a plan argument resolved from configuration constants
pub const CONFIG_ARG_PREFIX: char = '$';

/// The prefix of a plan argument resolved to the address of a contract
/// handled earlier in the run
pub const HANDLE_ARG_PREFIX: char = '@';

/// How long to wait between receipt polls
pub const RECEIPT_POLL_INTERVAL_MS: u64 = 500;
