#![no_main]

use bytes::BytesMut;
use libfuzzer_sys::fuzz_target;
use proclink_core::subscription::SubscriptionEvent;
use proclink_zmtp::codec::ZmtpDecoder;
use proclink_zmtp::envelope::Envelope;

fuzz_target!(|data: &[u8]| {
    // Frame decoding must never panic, whatever arrives on the wire.
    let mut decoder = ZmtpDecoder::with_max_frame_size(None);
    let mut buf = BytesMut::from(data);
    while let Ok(Some(frame)) = decoder.decode(&mut buf) {
        let _ = SubscriptionEvent::from_message(&frame.payload);
        let _ = Envelope::decode(&frame.payload);
    }

    let _ = Envelope::decode(data);
});
