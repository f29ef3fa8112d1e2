//! Definitions of Solidity functions called during deployment

use alloy::sol;

// `XCProxyAdmin`
sol! {
    function getProxyImplementation(address proxy) external view returns (address implementation);
    function upgrade(address proxy, address implementation) external;
}

// `Ownable` & `AccessControl`
sol! {
    function owner() external view returns (address owner);
    function transferOwnership(address newOwner) external;
    function hasRole(bytes32 role, address account) external view returns (bool granted);
    function grantRole(bytes32 role, address account) external;
    function revokeRole(bytes32 role, address account) external;
}
