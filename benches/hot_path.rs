use bytes::Bytes;
use chatbridge::auth::{authenticate, build_allowed_key_set};
use chatbridge::config::{
    AppConfig, ClientAuthConfig, FeaturesConfig, ServerConfig, UpstreamConfig,
};
use chatbridge::protocol::openai_chat::stream::ChunkEncoder;
use chatbridge::protocol::openai_chat::OutputChunk;
use chatbridge::stream::{FrameReassembler, StreamSession, UpstreamEvent};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn upstream_payload(deltas: usize) -> Vec<u8> {
    let mut payload = String::with_capacity(deltas * 128 + 512);
    payload.push_str(
        "event: message_start\ndata: {\"type\":\"message_start\",\"message\":{\"id\":\"msg_bench\",\"usage\":{\"input_tokens\":42}}}\n\n",
    );
    payload.push_str("event: content_block_start\ndata: {\"type\":\"content_block_start\",\"index\":0}\n\n");
    for idx in 0..deltas {
        payload.push_str("event: content_block_delta\ndata: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"token ");
        payload.push_str(&idx.to_string());
        payload.push_str(" \\\"quoted\\\"\"}}\n\n");
    }
    payload.push_str("event: content_block_stop\ndata: {\"type\":\"content_block_stop\",\"index\":0}\n\n");
    payload.push_str(
        "event: message_delta\ndata: {\"type\":\"message_delta\",\"delta\":{\"stop_reason\":\"end_turn\"},\"usage\":{\"output_tokens\":256}}\n\n",
    );
    payload.push_str("event: message_stop\ndata: {\"type\":\"message_stop\"}\n\n");
    payload.into_bytes()
}

fn encoder() -> ChunkEncoder {
    ChunkEncoder::new(
        "chatcmpl-bench".to_string(),
        "claude-bench".to_string(),
        1_700_000_000,
    )
}

fn bench_frame_reassembly(c: &mut Criterion) {
    let payload = upstream_payload(256);

    c.bench_function("reassemble_256_deltas_single_read", |b| {
        b.iter(|| {
            let mut reassembler = FrameReassembler::new();
            let mut events: Vec<UpstreamEvent> = Vec::with_capacity(300);
            reassembler.feed_into(black_box(&payload), &mut events);
            black_box(events.len())
        });
    });

    c.bench_function("reassemble_256_deltas_37b_reads", |b| {
        b.iter(|| {
            let mut reassembler = FrameReassembler::new();
            let mut events: Vec<UpstreamEvent> = Vec::with_capacity(300);
            for piece in payload.chunks(37) {
                reassembler.feed_into(black_box(piece), &mut events);
            }
            black_box(events.len())
        });
    });
}

fn bench_session_feed(c: &mut Criterion) {
    let payload = upstream_payload(256);

    c.bench_function("session_feed_256_deltas_1k_reads", |b| {
        b.iter(|| {
            let mut session = StreamSession::new(encoder());
            let mut out: Vec<Bytes> = Vec::with_capacity(300);
            for piece in payload.chunks(1024) {
                session.feed(black_box(piece), &mut out);
            }
            black_box(out.len())
        });
    });
}

fn bench_chunk_encoding(c: &mut Criterion) {
    let encoder = encoder();
    let short = OutputChunk::content("Hello".to_string());
    let escaped = OutputChunk::content("line one\nline \"two\"\tend \u{1}".repeat(16));
    let finish = OutputChunk::finish("stop".to_string());

    c.bench_function("encode_content_chunk_short", |b| {
        b.iter(|| black_box(encoder.encode_chunk(black_box(&short))));
    });
    c.bench_function("encode_content_chunk_escaped_512b", |b| {
        b.iter(|| black_box(encoder.encode_chunk(black_box(&escaped))));
    });
    c.bench_function("encode_finish_chunk", |b| {
        b.iter(|| black_box(encoder.encode_chunk(black_box(&finish))));
    });
    c.bench_function("encode_error_chunk", |b| {
        b.iter(|| black_box(encoder.encode_error(black_box("Overloaded"), Some(529))));
    });
}

fn auth_config(allowed_keys: Vec<String>) -> AppConfig {
    AppConfig {
        server: ServerConfig::default(),
        upstream: UpstreamConfig {
            base_url: "https://api.anthropic.com/v1".to_string(),
            api_key: "upstream-secret".to_string(),
            api_key_env: None,
            model: "claude-bench".to_string(),
            default_max_tokens: 4096,
            api_version: "2023-06-01".to_string(),
            timeout_secs: 300,
            connect_timeout_secs: 5,
        },
        client_authentication: ClientAuthConfig { allowed_keys },
        features: FeaturesConfig::default(),
    }
}

fn bench_authentication(c: &mut Criterion) {
    let single_keys = build_allowed_key_set(&auth_config(vec!["client-key".to_string()]));
    let mut headers = http::HeaderMap::new();
    headers.insert("authorization", "Bearer client-key".parse().unwrap());
    c.bench_function("auth_single_bearer", |b| {
        b.iter(|| black_box(authenticate(black_box(&headers), black_box(&single_keys)).is_ok()));
    });

    let mut multi_allowed: Vec<String> = (0..63).map(|idx| format!("k-{idx:03}")).collect();
    multi_allowed.push("client-key".to_string());
    let multi_keys = build_allowed_key_set(&auth_config(multi_allowed));
    c.bench_function("auth_multi64_bearer", |b| {
        b.iter(|| black_box(authenticate(black_box(&headers), black_box(&multi_keys)).is_ok()));
    });
}

criterion_group!(
    benches,
    bench_frame_reassembly,
    bench_session_feed,
    bench_chunk_encoding,
    bench_authentication
);
criterion_main!(benches);
