//! Contract Definitions
//!
//! ERC20 fragments used by the scheduler, defined with alloy's `sol!` macro.
//! `#[sol(rpc)]` generates a contract instance type for balance lookups.
//!
//! Author: AI-Generated
//! Created: 2026-10-14

use alloy::sol;

sol! {
    #[sol(rpc)]
    interface IERC20 {
        event Transfer(address indexed from, address indexed to, uint256 value);

        function balanceOf(address account) external view returns (uint256);
    }
}
