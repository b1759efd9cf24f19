//! Interface definitions of the contracts the core reads from. Kept inline:
//! the core never deploys or mutates them, it only queries.

/// Read surface of the adjudicator contract.
pub const ADJUDICATOR_ABI: &str = r#"[
	{
		"name": "getChannelBalance",
		"type": "function",
		"stateMutability": "view",
		"inputs": [
			{ "name": "channel", "type": "address" },
			{ "name": "assetId", "type": "address" }
		],
		"outputs": [
			{ "name": "balance", "type": "uint256" }
		]
	},
	{
		"name": "getLatestDeposit",
		"type": "function",
		"stateMutability": "view",
		"inputs": [
			{ "name": "channel", "type": "address" },
			{ "name": "assetId", "type": "address" },
			{ "name": "sinceNonce", "type": "uint256" }
		],
		"outputs": [
			{ "name": "amount", "type": "uint256" },
			{ "name": "nonce", "type": "uint256" }
		]
	}
]"#;

/// Read surface every transfer definition contract exposes. State, balance
/// and resolver payloads cross the boundary ABI-encoded.
pub const TRANSFER_DEFINITION_ABI: &str = r#"[
	{
		"name": "create",
		"type": "function",
		"stateMutability": "view",
		"inputs": [
			{ "name": "encodedState", "type": "bytes" },
			{ "name": "encodedBalance", "type": "bytes" }
		],
		"outputs": [
			{ "name": "accepted", "type": "bool" }
		]
	},
	{
		"name": "resolve",
		"type": "function",
		"stateMutability": "view",
		"inputs": [
			{ "name": "encodedState", "type": "bytes" },
			{ "name": "encodedBalance", "type": "bytes" },
			{ "name": "encodedResolver", "type": "bytes" }
		],
		"outputs": [
			{ "name": "aliceTo", "type": "address" },
			{ "name": "bobTo", "type": "address" },
			{ "name": "aliceAmount", "type": "uint256" },
			{ "name": "bobAmount", "type": "uint256" }
		]
	}
]"#;
