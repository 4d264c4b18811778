pub mod firewall;
pub mod instance;
pub mod subnet;
pub mod vpc_network;

pub use firewall::FirewallAdapter;
pub use instance::InstanceAdapter;
pub use subnet::SubnetAdapter;
pub use vpc_network::VpcNetworkAdapter;
