use std::sync::Mutex;

use duplex_primitives::types::{
	Address,
	ChannelCommitment,
	Nonce,
	TransferId,
};
use duplex_state_machine::{
	machine::{
		apply_update,
		TransferChange,
	},
	types::{
		ChannelUpdate,
		FullChannelState,
		FullTransferState,
	},
};
use rusqlite::{
	params,
	Connection,
};
use ulid::Ulid;

use crate::{
	errors::StorageError,
	sqlite,
};

pub type Result<T> = std::result::Result<T, StorageError>;

/// One row of the append-only commitment log.
pub struct CommitmentRecord {
	pub identifier: String,
	pub nonce: Nonce,
	pub commitment: ChannelCommitment,
	pub update: ChannelUpdate,
}

/// Persistence seam of the protocol driver.
///
/// `save_channel` writes the new state, the commitment log entry and the
/// transfer delta in one transaction; a partially persisted round must be
/// impossible.
pub trait ChannelStorage: Send + Sync {
	fn load_channel(&self, channel_address: Address) -> Result<Option<FullChannelState>>;
	fn save_channel(
		&self,
		state: &FullChannelState,
		commitment: &ChannelCommitment,
		transfer_change: Option<&TransferChange>,
	) -> Result<()>;
	fn load_active_transfers(&self, channel_address: Address) -> Result<Vec<FullTransferState>>;
	fn save_transfer(&self, transfer: &FullTransferState) -> Result<()>;
	fn remove_transfer(&self, transfer_id: TransferId) -> Result<()>;
	fn load_commitments(&self, channel_address: Address) -> Result<Vec<CommitmentRecord>>;
}

/// Channel storage over a sqlite database.
pub struct SqliteStorage {
	conn: Mutex<Connection>,
}

/// Storage key of an address.
fn address_key(address: Address) -> String {
	format!("{:#x}", address)
}

impl SqliteStorage {
	pub fn new(conn: Connection) -> Self {
		Self { conn: Mutex::new(conn) }
	}

	/// An empty database living in memory, for tests and dry runs.
	pub fn in_memory() -> Result<Self> {
		let storage = Self::new(Connection::open_in_memory()?);
		storage.setup_database()?;
		Ok(storage)
	}

	pub fn setup_database(&self) -> Result<()> {
		let setup_db_sql = format!(
			"
			PRAGMA foreign_keys=off;
			BEGIN TRANSACTION;
			{}{}{}
			COMMIT;
			PRAGMA foreign_keys=on;
			",
			sqlite::DB_CREATE_CHANNELS,
			sqlite::DB_CREATE_COMMITMENTS,
			sqlite::DB_CREATE_TRANSFERS,
		);
		self.conn
			.lock()
			.map_err(|_| StorageError::CannotLock)?
			.execute_batch(&setup_db_sql)?;

		Ok(())
	}

	/// Rebuild a channel by replaying its commitment log from the first
	/// update and cross-check the result against the stored latest state.
	pub fn replay_channel(&self, channel_address: Address) -> Result<FullChannelState> {
		let records = self.load_commitments(channel_address)?;
		if records.is_empty() {
			return Err(StorageError::Corrupted(format!(
				"No commitments recorded for {:#x}",
				channel_address
			)))
		}

		let mut state: Option<FullChannelState> = None;
		let mut active_transfers: Vec<FullTransferState> = vec![];
		for record in records {
			let result = apply_update(state.as_ref(), &record.update, &active_transfers)
				.map_err(|e| {
					StorageError::Corrupted(format!(
						"Logged update {} does not apply: {}",
						record.nonce, e
					))
				})?;
			match result.transfer_change {
				Some(TransferChange::Created(transfer)) => active_transfers.push(transfer),
				Some(TransferChange::Resolved(transfer)) =>
					active_transfers.retain(|t| t.transfer_id != transfer.transfer_id),
				None => {},
			}
			let mut new_state = result.new_state;
			new_state.latest_update = Some(record.update);
			state = Some(new_state);
		}
		let replayed = match state {
			Some(state) => state,
			None =>
				return Err(StorageError::Corrupted(format!(
					"Empty replay for {:#x}",
					channel_address
				))),
		};

		let stored = self.load_channel(channel_address)?.ok_or_else(|| {
			StorageError::Corrupted(format!("Channel {:#x} has a log but no state", channel_address))
		})?;
		if replayed.core != stored.core {
			return Err(StorageError::Corrupted(format!(
				"Replayed nonce {} diverges from stored nonce {}",
				replayed.core.nonce, stored.core.nonce
			)))
		}

		Ok(replayed)
	}
}

impl ChannelStorage for SqliteStorage {
	fn load_channel(&self, channel_address: Address) -> Result<Option<FullChannelState>> {
		let conn = self.conn.lock().map_err(|_| StorageError::CannotLock)?;
		let mut stmt = conn.prepare("SELECT data FROM channels WHERE channel_address = ?1")?;
		let mut rows = stmt.query(params![address_key(channel_address)])?;

		match rows.next()? {
			Some(row) => {
				let data: String = row.get(0)?;
				Ok(Some(serde_json::from_str(&data)?))
			},
			None => Ok(None),
		}
	}

	fn save_channel(
		&self,
		state: &FullChannelState,
		commitment: &ChannelCommitment,
		transfer_change: Option<&TransferChange>,
	) -> Result<()> {
		let update = state.latest_update.as_ref().ok_or(StorageError::Other(
			"Refusing to persist a state without its producing update",
		))?;
		let serialized_state = serde_json::to_string(state)?;
		let serialized_commitment = serde_json::to_string(commitment)?;
		let serialized_update = serde_json::to_string(update)?;

		let mut conn = self.conn.lock().map_err(|_| StorageError::CannotLock)?;
		let tx = conn.transaction()?;

		tx.execute(
			"INSERT INTO channels(channel_address, data) VALUES(?1, ?2)
			ON CONFLICT(channel_address) DO UPDATE SET data = ?2",
			params![address_key(state.core.channel_address), serialized_state],
		)?;
		tx.execute(
			"INSERT INTO commitments(identifier, channel_address, nonce, data, update_data)
			VALUES(?1, ?2, ?3, ?4, ?5)",
			params![
				Ulid::new().to_string(),
				address_key(state.core.channel_address),
				state.core.nonce.as_u64() as i64,
				serialized_commitment,
				serialized_update,
			],
		)?;
		match transfer_change {
			Some(TransferChange::Created(transfer)) => {
				tx.execute(
					"INSERT INTO transfers(transfer_id, channel_address, data) VALUES(?1, ?2, ?3)",
					params![
						format!("{:#x}", transfer.transfer_id),
						address_key(transfer.channel_address),
						serde_json::to_string(transfer)?,
					],
				)?;
			},
			Some(TransferChange::Resolved(transfer)) => {
				tx.execute(
					"DELETE FROM transfers WHERE transfer_id = ?1",
					params![format!("{:#x}", transfer.transfer_id)],
				)?;
			},
			None => {},
		}

		tx.commit()?;
		Ok(())
	}

	fn load_active_transfers(&self, channel_address: Address) -> Result<Vec<FullTransferState>> {
		let conn = self.conn.lock().map_err(|_| StorageError::CannotLock)?;
		let mut stmt =
			conn.prepare("SELECT data FROM transfers WHERE channel_address = ?1")?;
		let mut rows = stmt.query(params![address_key(channel_address)])?;

		let mut transfers = vec![];
		while let Ok(Some(row)) = rows.next() {
			let data: String = row.get(0)?;
			transfers.push(serde_json::from_str(&data)?);
		}

		Ok(transfers)
	}

	fn save_transfer(&self, transfer: &FullTransferState) -> Result<()> {
		let serialized_transfer = serde_json::to_string(transfer)?;
		let conn = self.conn.lock().map_err(|_| StorageError::CannotLock)?;
		conn.execute(
			"INSERT INTO transfers(transfer_id, channel_address, data) VALUES(?1, ?2, ?3)
			ON CONFLICT(transfer_id) DO UPDATE SET data = ?3",
			params![
				format!("{:#x}", transfer.transfer_id),
				address_key(transfer.channel_address),
				serialized_transfer,
			],
		)?;
		Ok(())
	}

	fn remove_transfer(&self, transfer_id: TransferId) -> Result<()> {
		let conn = self.conn.lock().map_err(|_| StorageError::CannotLock)?;
		conn.execute(
			"DELETE FROM transfers WHERE transfer_id = ?1",
			params![format!("{:#x}", transfer_id)],
		)?;
		Ok(())
	}

	fn load_commitments(&self, channel_address: Address) -> Result<Vec<CommitmentRecord>> {
		let conn = self.conn.lock().map_err(|_| StorageError::CannotLock)?;
		let mut stmt = conn.prepare(
			"SELECT identifier, nonce, data, update_data FROM commitments
			WHERE channel_address = ?1 ORDER BY nonce ASC",
		)?;
		let mut rows = stmt.query(params![address_key(channel_address)])?;

		let mut records = vec![];
		while let Ok(Some(row)) = rows.next() {
			let identifier: String = row.get(0)?;
			let nonce: i64 = row.get(1)?;
			let data: String = row.get(2)?;
			let update_data: String = row.get(3)?;
			records.push(CommitmentRecord {
				identifier,
				nonce: Nonce::from(nonce as u64),
				commitment: serde_json::from_str(&data)?,
				update: serde_json::from_str(&update_data)?,
			});
		}

		Ok(records)
	}
}
