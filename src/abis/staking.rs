use alloy::sol;

sol! {
    event Delegate(address indexed guardian, address indexed operator, uint256 amount);
    event Undelegate(address indexed guardian, address indexed operator, uint256 amount);
    event Mint(address indexed guardian, address indexed to, uint256 amount);
}
