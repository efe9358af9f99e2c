use crate::config::Config;
use crate::metrics;
use crate::wol;
use crate::wol::udp::UdpDialer;
use log::{info, warn};
use rouille::{Request, Response, Server};
use std::error::Error;
use std::net::ToSocketAddrs;

pub const WAKE_ROUTE: &str = "/api/wake";

const INDEX_TEMPLATE: &str = include_str!("index.html");
const STATIC_FILES: [(&str, &str, &str); 1] = [(
    "/static/index.js",
    "text/javascript; charset=utf-8",
    include_str!("static/index.js"),
)];

pub fn render_index(config: &Config) -> String {
    INDEX_TEMPLATE
        .replace("{{ .ServiceName }}", &config.service_name)
        .replace("{{ .WakeupTime }}", &config.server_wakeup_time.to_string())
        .replace("{{ .AliveRoute }}", &config.service_alive_route)
}

/// Request handling for the wake page. Shared read-only between server threads.
pub struct App {
    config: Config,
    index: String,
    dialer: Box<dyn wol::Dialer>,
}

impl App {
    pub fn new(config: Config) -> Self {
        Self::with_dialer(config, Box::new(UdpDialer))
    }

    pub fn with_dialer(config: Config, dialer: Box<dyn wol::Dialer>) -> Self {
        let index = render_index(&config);
        Self {
            config,
            index,
            dialer,
        }
    }

    /// Binds the HTTP server; call `run` on the result to serve requests.
    pub fn bind<A: ToSocketAddrs>(
        self,
        addr: A,
    ) -> Result<
        Server<impl Fn(&Request) -> Response + Send + Sync + 'static>,
        Box<dyn Error + Send + Sync>,
    > {
        Server::new(addr, move |request| self.handle(request))
    }

    pub fn handle(&self, request: &Request) -> Response {
        let resp = self.route(request);
        info!(
            "{method} {request} {status}",
            method = request.method(),
            request = request.raw_url(),
            status = resp.status_code,
        );
        resp
    }

    fn route(&self, request: &Request) -> Response {
        let url = request.url();
        let method = request.method();
        // Other methods on the wake route fall through to the redirect below.
        if url == WAKE_ROUTE && method == "POST" {
            return self.wake();
        }
        if url == "/varz" && method == "GET" {
            return varz();
        }
        if url == self.config.service_alive_route && method == "GET" {
            // The page reloads once something other than us answers this route.
            return Response::text("")
                .with_status_code(425)
                .with_unique_header("Cache-Control", "no-cache");
        }
        if url.starts_with("/static") {
            return match STATIC_FILES.iter().find(|(path, _, _)| *path == url) {
                Some((_, content_type, body)) => Response::from_data(*content_type, *body),
                None => Response::empty_404(),
            };
        }
        match url.as_str() {
            "/" | "/index.html" => Response::html(self.index.clone()),
            _ => Response::redirect_307("/"),
        }
    }

    fn wake(&self) -> Response {
        let result = wol::send_magic_packet(
            self.dialer.as_ref(),
            &self.config.mac_address,
            &wol::broadcast_target(&self.config.broadcast_address),
        );
        metrics::record(&result);
        match result {
            Ok(()) => Response::text(""),
            Err(e) => {
                warn!("failed to send magic packet: {}", e);
                e.into()
            }
        }
    }
}

fn varz() -> Response {
    match metrics::render() {
        Ok(body) => Response::text(body),
        Err(e) => Response::text(e.to_string()).with_status_code(500),
    }
}
