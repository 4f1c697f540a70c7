// Session handshake: swap display names over a fresh connection.
//
// Both roles run the same sequence (send ours, then read theirs), so neither
// side waits to see the other's name before sending its own and the exchange
// cannot deadlock.

use std::time::Duration;

use log::debug;
use rochambeau_protocol::PeerIdentity;
use rochambeau_protocol::message::PeerMessage;

use crate::connection::Connection;
use crate::error::SessionError;

/// Send `local`, then wait up to `timeout` for the opponent's name.
pub fn exchange_names(
    conn: &mut Connection,
    local: &PeerIdentity,
    timeout: Option<Duration>,
) -> Result<PeerIdentity, SessionError> {
    conn.send(&PeerMessage::display_name(local))
        .map_err(SessionError::handshake)?;
    let reply = conn.recv(timeout).map_err(SessionError::handshake)?;
    let remote = reply
        .into_identity()
        .map_err(|e| SessionError::ProtocolViolation(e.to_string()))?;
    debug!("[Session] Handshake with {}: {local} <-> {remote}", conn.peer_addr());
    Ok(remote)
}
