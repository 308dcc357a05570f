//
//  Sample application.
//
//  Listens on localhost:4918, plain http, no ssl.
//  Connect to http://localhost:4918/dav/
//

use std::convert::Infallible;
use std::error::Error;
use std::net::SocketAddr;
use std::str::FromStr;

use clap::Parser;
use futures_util::future::TryFutureExt;

use dav_mount::{BasicAuth, DavAuth, DavHandler, MemAuth};

#[derive(Debug, clap::Parser)]
#[command(about, version)]
struct Cli {
    /// port to listen on
    #[arg(short, long, default_value = "4918")]
    port: u16,
    /// local directory to serve
    #[arg(short, long, default_value = ".")]
    dir: String,
    /// service path the directory is served under
    #[arg(long, default_value = "/dav")]
    dav_root: String,
    /// virtual mount, as VIRTUAL=REAL. May be repeated; the last match wins.
    #[arg(short, long)]
    mount: Vec<String>,
    /// concurrent requests per user
    #[arg(long, default_value = "32")]
    max_connections: usize,
    /// serve HTTP/2 only (h2c)
    #[arg(long)]
    http2: bool,
    /// require basic authentication, as USER:PASS. May be repeated.
    #[arg(short, long)]
    auth: Vec<String>,
}

fn split_pair<'a>(arg: &'a str, sep: char, what: &str) -> Result<(&'a str, &'a str), Box<dyn Error>> {
    match arg.split_once(sep) {
        Some((a, b)) if !a.is_empty() && !b.is_empty() => Ok((a, b)),
        _ => Err(format!("invalid {what}: {arg:?}").into()),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let cli = Cli::parse();

    let mut config = DavHandler::builder(&cli.dir)
        .dav_root(cli.dav_root.as_str())
        .max_connections(cli.max_connections);
    for m in &cli.mount {
        let (virt, real) = split_pair(m, '=', "mount")?;
        config = config.virtual_mount(virt, real);
    }
    if !cli.auth.is_empty() {
        let users = MemAuth::new();
        for a in &cli.auth {
            let (user, pass) = split_pair(a, ':', "user")?;
            users.register(user, pass).await?;
        }
        config = config.middleware(BasicAuth::new(users, "dav"));
    }
    let dav_server = config.build();

    let make_service = hyper::service::make_service_fn(move |_| {
        let dav_server = dav_server.clone();
        async move {
            let func = move |req| {
                let dav_server = dav_server.clone();
                async move { Ok::<_, Infallible>(dav_server.handle(req).await) }
            };
            Ok::<_, hyper::Error>(hyper::service::service_fn(func))
        }
    });

    let addr = format!("0.0.0.0:{}", cli.port);
    let addr = SocketAddr::from_str(&addr)?;

    let server = hyper::Server::try_bind(&addr)?
        .http2_only(cli.http2)
        .serve(make_service)
        .map_err(|e| eprintln!("server error: {}", e));

    println!("Serving {} on http://localhost:{}{}", cli.dir, cli.port, cli.dav_root);
    let _ = server.await;
    Ok(())
}
