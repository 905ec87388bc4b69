//! Account add-ons bought with coins

use crate::ledger;
use crate::types::{Asset, OwnerId, Snapshot};
use crate::{Error, Result};

/// Buy the port forwarding add-on; a second purchase fails without charging
pub fn purchase_port_forwarding(snapshot: &mut Snapshot, owner: &OwnerId, price: u64) -> Result<u64> {
    if snapshot.account(owner)?.port_forwarding {
        return Err(Error::DuplicateResource(format!(
            "port forwarding for {}",
            owner
        )));
    }

    let remaining = ledger::debit(snapshot, owner, Asset::Coins, price)?;
    snapshot.account_mut(owner)?.port_forwarding = true;

    tracing::info!(owner = %owner, price, "Port forwarding purchased");
    Ok(remaining)
}
