// Simultaneous-reveal choice exchange.
//
// The send path and the receive path are independent:
//
// 1. `send_committed_choice` blocks on the local commit `Signal`. The value
//    it transmits is the one frozen when the UI fired the signal; nothing
//    read from the socket is consulted, so an opponent's frame that already
//    sits in the receive buffer cannot influence what we send.
// 2. `receive_choice` then reads the opponent's frame unconditionally. It is
//    only ever called after our own send, never used to gate it.
//
// Because each peer commits before it reads, neither can use the other's
// revealed choice to pick its own.

use std::time::Duration;

use log::debug;
use rochambeau_protocol::Choice;
use rochambeau_protocol::message::PeerMessage;

use crate::connection::Connection;
use crate::error::{SessionError, Stage};
use crate::signal::{CancelToken, Signal, WaitError};

/// Wait for the local commit, then transmit exactly that value.
pub fn send_committed_choice(
    conn: &mut Connection,
    commit: &Signal<Choice>,
    cancel: &CancelToken,
    timeout: Option<Duration>,
) -> Result<Choice, SessionError> {
    let choice = commit.wait(cancel, timeout).map_err(|e| match e {
        WaitError::Cancelled | WaitError::Closed => SessionError::Cancelled,
        WaitError::TimedOut => SessionError::TimedOut(Stage::LocalChoice),
    })?;
    conn.send(&PeerMessage::choice(choice))
        .map_err(SessionError::exchange)?;
    debug!("[Session] Sent choice {choice} to {}", conn.peer_addr());
    Ok(choice)
}

/// Read the opponent's choice frame.
pub fn receive_choice(
    conn: &mut Connection,
    timeout: Option<Duration>,
) -> Result<Choice, SessionError> {
    let msg = conn.recv(timeout).map_err(SessionError::exchange)?;
    msg.into_choice().map_err(SessionError::exchange)
}

#[cfg(test)]
mod tests {
    use std::io::{BufReader, BufWriter, Write};
    use std::net::{TcpListener, TcpStream};
    use std::sync::Arc;
    use std::thread;

    use rochambeau_protocol::framing::write_frame;
    use rochambeau_protocol::message::{recv_message, send_message};

    use super::*;

    fn conn_pair() -> (Connection, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let opponent = TcpStream::connect(addr).unwrap();
        let (ours, _) = listener.accept().unwrap();
        (Connection::from_stream(ours).unwrap(), opponent)
    }

    fn send_raw(stream: &TcpStream, msg: &PeerMessage) {
        let mut writer = BufWriter::new(stream.try_clone().unwrap());
        send_message(&mut writer, msg).unwrap();
    }

    fn recv_raw(stream: &TcpStream) -> PeerMessage {
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        let mut reader = BufReader::new(stream.try_clone().unwrap());
        recv_message(&mut reader).unwrap()
    }

    #[test]
    fn committed_value_is_sent_even_if_opponent_already_revealed() {
        let (mut ours, opponent) = conn_pair();
        // The opponent's choice is already waiting in our receive buffer.
        send_raw(&opponent, &PeerMessage::choice(Choice::Paper));
        thread::sleep(Duration::from_millis(30));

        let commit = Arc::new(Signal::new());
        let ui = {
            let commit = commit.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(30));
                commit.fire(Choice::Rock).unwrap();
            })
        };

        let sent = send_committed_choice(&mut ours, &commit, &CancelToken::new(), None).unwrap();
        assert_eq!(sent, Choice::Rock);
        assert_eq!(recv_raw(&opponent).into_choice().unwrap(), Choice::Rock);
        assert_eq!(
            receive_choice(&mut ours, Some(Duration::from_secs(5))).unwrap(),
            Choice::Paper
        );
        ui.join().unwrap();
    }

    #[test]
    fn nothing_is_sent_before_commit() {
        let (mut ours, opponent) = conn_pair();
        let commit: Signal<Choice> = Signal::new();
        let err = send_committed_choice(
            &mut ours,
            &commit,
            &CancelToken::new(),
            Some(Duration::from_millis(50)),
        )
        .unwrap_err();
        assert!(matches!(err, SessionError::TimedOut(Stage::LocalChoice)));

        opponent
            .set_read_timeout(Some(Duration::from_millis(50)))
            .unwrap();
        let mut reader = BufReader::new(opponent);
        assert!(recv_message::<_, PeerMessage>(&mut reader).is_err());
    }

    #[test]
    fn cancelled_commit_wait() {
        let (mut ours, _opponent) = conn_pair();
        let commit: Signal<Choice> = Signal::new();
        let token = CancelToken::new();
        token.cancel();
        let err = send_committed_choice(&mut ours, &commit, &token, None).unwrap_err();
        assert!(matches!(err, SessionError::Cancelled));
    }

    #[test]
    fn opponent_disconnect_aborts_session() {
        let (mut ours, opponent) = conn_pair();
        drop(opponent);
        let err = receive_choice(&mut ours, Some(Duration::from_secs(5))).unwrap_err();
        assert!(matches!(err, SessionError::SessionAborted(_)), "{err:?}");
    }

    #[test]
    fn out_of_domain_token_is_violation() {
        let (mut ours, opponent) = conn_pair();
        send_raw(
            &opponent,
            &PeerMessage::Choice {
                token: "dynamite".into(),
            },
        );
        let err = receive_choice(&mut ours, Some(Duration::from_secs(5))).unwrap_err();
        assert!(matches!(err, SessionError::ProtocolViolation(_)));
    }

    #[test]
    fn frame_split_across_writes_is_reassembled() {
        let (mut ours, opponent) = conn_pair();
        let json = payload_bytes(&PeerMessage::choice(Choice::Scissors));
        let mut wire = Vec::new();
        write_frame(&mut wire, &json).unwrap();

        let mut writer = opponent.try_clone().unwrap();
        let (head, tail) = wire.split_at(3);
        writer.write_all(head).unwrap();
        writer.flush().unwrap();
        let late = thread::spawn({
            let tail = tail.to_vec();
            move || {
                thread::sleep(Duration::from_millis(30));
                writer.write_all(&tail).unwrap();
            }
        });

        assert_eq!(
            receive_choice(&mut ours, Some(Duration::from_secs(5))).unwrap(),
            Choice::Scissors
        );
        late.join().unwrap();
    }

    fn payload_bytes(msg: &PeerMessage) -> Vec<u8> {
        let mut framed = Vec::new();
        send_message(&mut framed, msg).unwrap();
        // Strip the 4-byte prefix to get the bare payload.
        framed.split_off(4)
    }
}
