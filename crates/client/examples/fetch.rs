use http::{HeaderMap, Method};
use micro_http_client::connection::HttpConnection;
use micro_http_client::protocol::HttpError;

use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

fn main() -> Result<(), HttpError> {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let host = std::env::args().nth(1).unwrap_or_else(|| "example.com".to_string());
    let path = std::env::args().nth(2).unwrap_or_else(|| "/".to_string());

    info!(%host, %path, "fetching");
    let mut conn = HttpConnection::new(&host)?;
    conn.request(&Method::GET, &path, b"", &HeaderMap::new())?;

    let mut response = conn.get_response()?;
    info!(
        status = response.status()?,
        reason = response.reason()?,
        will_close = response.will_close()?,
        "response head received"
    );
    for (name, value) in response.headers()? {
        info!(header = %name, value = ?value);
    }

    let body = response.read(None)?;
    println!("{}", String::from_utf8_lossy(&body));

    conn.close();
    Ok(())
}
