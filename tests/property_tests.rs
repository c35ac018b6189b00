mod common;

use common::*;
use proptest::prelude::*;
use std::net::TcpStream;

fn line() -> impl Strategy<Value = Vec<u8>> {
    proptest::collection::vec(any::<u8>().prop_filter("no delimiter", |b| *b != b'\r'), 0..32)
        .prop_map(|mut bytes| {
            bytes.push(b'\r');
            bytes
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn every_live_client_receives_every_broadcast(
        clients in 1usize..5,
        lines in proptest::collection::vec(line(), 1..6),
    ) {
        let mut mux = mux();
        let mut streams: Vec<TcpStream> = (0..clients).map(|_| connect(&mut mux)).collect();

        for line in &lines {
            mux.enqueue_outbound(line.clone());
        }
        mux.cycle(TICK).unwrap();
        cycle_until(&mut mux, |m| flushed(m));

        let expected = lines.concat();
        for stream in &mut streams {
            prop_assert_eq!(read_exactly(stream, expected.len()), expected.clone());
        }
    }

    #[test]
    fn client_stream_arrives_in_order(
        chunks in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 1..200), 1..8),
    ) {
        use std::io::Write;

        let mut mux = mux();
        let mut client = connect(&mut mux);
        let expected = chunks.concat();
        for chunk in &chunks {
            client.write_all(chunk).unwrap();
        }

        let mut received = Vec::new();
        cycle_until(&mut mux, |m| {
            received.extend(m.drain_inbound().concat());
            received.len() >= expected.len()
        });
        prop_assert_eq!(received, expected);
    }
}
