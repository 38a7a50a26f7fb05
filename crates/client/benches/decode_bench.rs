use std::hint::black_box;
use std::io::{self, Read, Write};

use criterion::{BatchSize, Criterion, Throughput, criterion_group, criterion_main};
use http::{HeaderMap, Method};
use micro_http_client::connection::{ClientConfig, HttpConnection};
use micro_http_client::protocol::HttpError;
use micro_http_client::transport::{Connector, Transport, TransportKind};

// In-memory IO for benchmarking
struct MemoryTransport {
    read_data: Vec<u8>,
    read_pos: usize,
}

impl MemoryTransport {
    fn new(read_data: Vec<u8>) -> Self {
        Self { read_data, read_pos: 0 }
    }
}

impl Read for MemoryTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = &self.read_data[self.read_pos..];
        let amt = remaining.len().min(buf.len());
        buf[..amt].copy_from_slice(&remaining[..amt]);
        self.read_pos += amt;
        Ok(amt)
    }
}

impl Write for MemoryTransport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Transport for MemoryTransport {
    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

struct MemoryConnector {
    response: Vec<u8>,
}

impl Connector for MemoryConnector {
    fn open(&mut self, _: TransportKind, _: &str, _: u16) -> Result<Box<dyn Transport>, HttpError> {
        Ok(Box::new(MemoryTransport::new(self.response.clone())))
    }
}

fn connection_for(response: &[u8]) -> HttpConnection {
    let connector = MemoryConnector { response: response.to_vec() };
    HttpConnection::with_connector("bench.local", ClientConfig::default(), Box::new(connector))
        .expect("host spec should be valid")
}

fn length_framed_response(body_len: usize) -> Vec<u8> {
    let mut response = format!(
        "HTTP/1.1 200 OK\r\n\
         Server: bench\r\n\
         Date: Thu, 01 Jan 1970 00:00:00 GMT\r\n\
         Content-Type: application/octet-stream\r\n\
         Content-Length: {body_len}\r\n\r\n"
    )
    .into_bytes();
    response.extend(std::iter::repeat_n(b'x', body_len));
    response
}

fn chunked_response(chunk_len: usize, chunks: usize) -> Vec<u8> {
    let mut response =
        b"HTTP/1.1 200 OK\r\nServer: bench\r\nTransfer-Encoding: chunked\r\n\r\n".to_vec();
    for _ in 0..chunks {
        response.extend(format!("{chunk_len:x}\r\n").into_bytes());
        response.extend(std::iter::repeat_n(b'x', chunk_len));
        response.extend(b"\r\n");
    }
    response.extend(b"0\r\n\r\n");
    response
}

fn benchmark_response_decode(criterion: &mut Criterion) {
    let cases: Vec<(&str, Vec<u8>)> = vec![
        ("length_16k", length_framed_response(16 * 1024)),
        ("chunked_16x1k", chunked_response(1024, 16)),
    ];

    let mut group = criterion.benchmark_group("response_decode");
    for (name, response) in cases {
        group.throughput(Throughput::Bytes(response.len() as u64));
        group.bench_function(name, |b| {
            b.iter_batched_ref(
                || connection_for(&response),
                |conn| {
                    conn.request(&Method::GET, "/", b"", &HeaderMap::new())
                        .expect("request should send");
                    let mut resp = conn.get_response().expect("head should parse");
                    let body = resp.read(None).expect("body should decode");
                    black_box(body);
                },
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

criterion_group!(decode, benchmark_response_decode);
criterion_main!(decode);
