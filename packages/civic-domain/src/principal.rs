use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
	Citizen,
	Officer,
	Admin,
}
impl Role {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Citizen => "citizen",
			Self::Officer => "officer",
			Self::Admin => "admin",
		}
	}
}
impl FromStr for Role {
	type Err = String;

	fn from_str(raw: &str) -> Result<Self, Self::Err> {
		match raw.trim().to_ascii_lowercase().as_str() {
			"citizen" => Ok(Self::Citizen),
			"officer" => Ok(Self::Officer),
			"admin" => Ok(Self::Admin),
			other => Err(format!("Unknown role {other:?}.")),
		}
	}
}

/// The authenticated caller as supplied by the identity provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
	pub user_id: i64,
	pub role: Role,
	pub ward: Option<i32>,
}
impl Principal {
	pub fn citizen(user_id: i64, ward: i32) -> Self {
		Self { user_id, role: Role::Citizen, ward: Some(ward) }
	}

	pub fn officer(user_id: i64, ward: i32) -> Self {
		Self { user_id, role: Role::Officer, ward: Some(ward) }
	}

	pub fn admin(user_id: i64) -> Self {
		Self { user_id, role: Role::Admin, ward: None }
	}
}
