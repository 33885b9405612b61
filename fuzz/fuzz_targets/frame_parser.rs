#![no_main]

use libfuzzer_sys::fuzz_target;
use wiremux::{Frame, Header, HEADER_SIZE};

fuzz_target!(|data: &[u8]| {
    if data.len() < HEADER_SIZE {
        return;
    }
    let mut hdr = [0_u8; HEADER_SIZE];
    hdr.copy_from_slice(&data[..HEADER_SIZE]);
    if let Ok(header) = Header::decode(hdr) {
        // whatever decodes must re-encode to the same header bytes
        let payload = &data[HEADER_SIZE..data.len().min(HEADER_SIZE + usize::from(header.length))];
        let frame = Frame {
            cmd: header.cmd,
            stream_id: header.stream_id,
            payload,
        };
        let bytes = frame.encode().expect("payload fits a frame");
        assert_eq!(bytes[0], hdr[0]);
        assert_eq!(bytes[1], hdr[1]);
        assert_eq!(&bytes[4..HEADER_SIZE], &hdr[4..HEADER_SIZE]);
    }
});
