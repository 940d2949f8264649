//! Protocol-level exchanges without a transport
//!
//! Drives `SendWindow`, `ClientHandshake` and the receiver `Connection`
//! against each other directly, passing every packet through the codec.

use bytes::Bytes;
use rft_protocol::{
    AckOutcome, ClientHandshake, Connection, ConnectionId, Flags, Packet, ReceiveOutcome,
    SendWindow, SeqNumber, CLIENT_ISN, HEADER_SIZE, MAX_PACKET_SIZE, SERVER_ISN,
};

fn wire(packet: &Packet) -> Packet {
    let mut buf = [0u8; MAX_PACKET_SIZE];
    let len = packet.encode_into(&mut buf).unwrap();
    Packet::from_bytes(&buf[..len]).unwrap()
}

fn file(len: usize) -> Bytes {
    Bytes::from((0..len).map(|i| (i * 31 % 251) as u8).collect::<Vec<u8>>())
}

fn establish() -> (ConnectionId, Connection) {
    let mut client = ClientHandshake::new(SeqNumber::new(CLIENT_ISN));
    let syn = wire(&client.syn());

    let (connection, syn_ack) = Connection::accept(ConnectionId::new(1), &syn).unwrap();
    let ack = client.process(&wire(&syn_ack)).unwrap();

    assert_eq!(ack.seq_number().as_raw(), CLIENT_ISN + 1);
    assert_eq!(ack.ack_number().as_raw(), SERVER_ISN + 1);
    (ConnectionId::new(1), connection)
}

#[test]
fn test_lossless_1500_byte_exchange() {
    let data = file(1500);
    let (id, mut receiver) = establish();
    let mut sender = SendWindow::new(SeqNumber::new(CLIENT_ISN), data.clone());

    let mut sizes = Vec::new();
    let mut acks = Vec::new();

    while !sender.is_complete() {
        let batch: Vec<_> = std::iter::from_fn(|| sender.next_segment()).collect();
        for segment in batch {
            let packet = wire(&segment.to_packet(id));
            sizes.push(packet.payload_len());

            let reply = match receiver.on_packet(&packet) {
                ReceiveOutcome::Accepted { reply } => wire(&reply),
                other => panic!("unexpected outcome {:?}", other),
            };
            acks.push(reply.ack_number().as_raw());
            assert!(matches!(
                sender.on_ack(reply.ack_number()),
                AckOutcome::Advanced { .. }
            ));
        }
    }

    assert_eq!(sizes, vec![512, 512, 476]);
    assert_eq!(
        acks,
        vec![CLIENT_ISN + 1 + 512, CLIENT_ISN + 1 + 1024, CLIENT_ISN + 1 + 1500]
    );

    let fin = wire(&Packet::control(
        sender.fin_sequence(),
        SeqNumber::default(),
        id,
        Flags::FIN,
    ));
    let fin_ack = match receiver.on_packet(&fin) {
        ReceiveOutcome::Finished { reply } => wire(&reply),
        other => panic!("unexpected outcome {:?}", other),
    };
    assert_eq!(fin_ack.flags(), Flags::ACK | Flags::FIN);
    assert_eq!(fin_ack.ack_number().as_raw(), CLIENT_ISN + 1 + 1500 + 1);

    let reassembled: Vec<u8> = receiver
        .segments()
        .iter()
        .flat_map(|s| s.iter().copied())
        .collect();
    assert_eq!(reassembled, data.to_vec());
}

#[test]
fn test_dropped_ack_retransmits_only_unacked_range() {
    let data = file(1500);
    let (id, mut receiver) = establish();
    let mut sender = SendWindow::new(SeqNumber::new(CLIENT_ISN), data.clone());

    // First segment arrives but its ACK is lost
    let first = sender.next_segment().unwrap();
    receiver.on_packet(&wire(&first.to_packet(id)));

    sender.on_timeout();
    assert_eq!(sender.congestion().ssthresh(), 256);
    assert_eq!(sender.congestion().congestion_window(), 512);

    // The retransmission is out of sequence for the receiver, whose
    // duplicate ACK still acknowledges it cumulatively
    let again = sender.next_segment().unwrap();
    assert!(again.retransmission);
    assert_eq!(again.offset, 0);

    let reply = match receiver.on_packet(&wire(&again.to_packet(id))) {
        ReceiveOutcome::OutOfOrder { reply } => reply,
        other => panic!("unexpected outcome {:?}", other),
    };
    assert_eq!(
        sender.on_ack(reply.ack_number()),
        AckOutcome::Advanced { acked_bytes: 512 }
    );
    assert_eq!(receiver.segments().len(), 1);

    while !sender.is_complete() {
        let batch: Vec<_> = std::iter::from_fn(|| sender.next_segment()).collect();
        for segment in batch {
            assert!(!segment.retransmission);
            if let ReceiveOutcome::Accepted { reply } =
                receiver.on_packet(&wire(&segment.to_packet(id)))
            {
                sender.on_ack(reply.ack_number());
            }
        }
    }

    assert_eq!(sender.stats().timeouts, 1);
    assert_eq!(sender.stats().retransmissions, 1);
    assert_eq!(receiver.bytes_received(), 1500);
}

#[test]
fn test_transfer_across_sequence_wrap() {
    // Longer than the sequence space
    let data = file(150_000);
    let (id, mut receiver) = establish();
    let mut sender = SendWindow::new(SeqNumber::new(CLIENT_ISN), data.clone());

    while !sender.is_complete() {
        let batch: Vec<_> = std::iter::from_fn(|| sender.next_segment()).collect();
        assert!(!batch.is_empty());
        for segment in batch {
            match receiver.on_packet(&wire(&segment.to_packet(id))) {
                ReceiveOutcome::Accepted { reply } => {
                    sender.on_ack(reply.ack_number());
                }
                other => panic!("unexpected outcome {:?}", other),
            }
        }
    }

    assert_eq!(receiver.bytes_received(), 150_000);
    assert!(!sender.congestion().in_slow_start());
    let reassembled: Vec<u8> = receiver
        .segments()
        .iter()
        .flat_map(|s| s.iter().copied())
        .collect();
    assert_eq!(reassembled, data.to_vec());
}

#[test]
fn test_payload_length_comes_from_datagram() {
    let packet = Packet::data(
        SeqNumber::new(CLIENT_ISN + 1),
        ConnectionId::new(1),
        Bytes::from_static(b"twelve bytes"),
    )
    .unwrap();
    let bytes = packet.to_bytes();
    assert_eq!(bytes.len(), HEADER_SIZE + 12);

    // Trailing bytes cut off in transit shorten the payload
    let cut = Packet::from_bytes(&bytes[..HEADER_SIZE + 5]).unwrap();
    assert_eq!(cut.payload_len(), 5);
    assert_eq!(&cut.payload[..], b"twelv");
}

#[test]
fn test_receiver_ack_wraps() {
    let syn = Packet::control(
        SeqNumber::new(102_000),
        SeqNumber::default(),
        ConnectionId::UNASSIGNED,
        Flags::SYN,
    );
    let (mut receiver, _) = Connection::accept(ConnectionId::new(5), &syn).unwrap();

    let packet = Packet::data(
        SeqNumber::new(102_001),
        ConnectionId::new(5),
        Bytes::from(vec![0u8; 512]),
    )
    .unwrap();
    match receiver.on_packet(&packet) {
        ReceiveOutcome::Accepted { reply } => {
            // (102001 + 512) mod 102401
            assert_eq!(reply.ack_number().as_raw(), 112);
        }
        other => panic!("unexpected outcome {:?}", other),
    }
    assert_eq!(receiver.expected_sequence().as_raw(), 112);
}
