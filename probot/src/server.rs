use crate::{classify, Classification, Dispatcher, Error, EventLog, Result, SecretProvider};
use futures::future::{self, Future, TryFutureExt};
use hyper::{
    server::conn::AddrStream,
    service::{make_service_fn, service_fn},
    Body, Method, Request, Response, Server as HyperServer, StatusCode,
};
use log::{error, info};
use std::{
    fmt,
    net::SocketAddr,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

/// Path webhook deliveries are posted to unless configured otherwise
pub const DEFAULT_HANDLER_PATH: &str = "/webhook";

#[derive(Debug)]
pub struct ServerBuilder {
    handler_path: String,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self {
            handler_path: DEFAULT_HANDLER_PATH.to_owned(),
        }
    }
}

impl ServerBuilder {
    pub fn handler_path<S: Into<String>>(&mut self, handler_path: S) -> &mut Self {
        self.handler_path = handler_path.into();
        self
    }

    pub fn build<C>(&self, dispatcher: Dispatcher<C>, secret: Arc<dyn SecretProvider>) -> Server<C> {
        Server {
            counter: Arc::new(AtomicUsize::new(0)),
            handler_path: self.handler_path.as_str().into(),
            dispatcher,
            secret,
        }
    }
}

/// The webhook endpoint.
///
/// `GET /` answers liveness probes, `POST` to the handler path accepts
/// deliveries. Anything else is a 404, or a 405 for other methods on the
/// handler path.
pub struct Server<C> {
    counter: Arc<AtomicUsize>,
    handler_path: Arc<str>,
    dispatcher: Dispatcher<C>,
    secret: Arc<dyn SecretProvider>,
}

impl<C> Clone for Server<C> {
    fn clone(&self) -> Self {
        Self {
            counter: self.counter.clone(),
            handler_path: self.handler_path.clone(),
            dispatcher: self.dispatcher.clone(),
            secret: self.secret.clone(),
        }
    }
}

impl<C> fmt::Debug for Server<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Server")
            .field("counter", &self.counter)
            .field("handler_path", &self.handler_path)
            .field("dispatcher", &self.dispatcher)
            .finish()
    }
}

impl<C: Send + Sync + 'static> Server<C> {
    pub fn handler_path(&self) -> &str {
        &self.handler_path
    }

    /// Serves requests on `addr` until `shutdown` resolves. Connections that
    /// are open at that point are allowed to finish.
    pub async fn serve<F>(self, addr: SocketAddr, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let server = self;

        // The closure inside `make_service_fn` is run for each connection,
        // creating a 'service' to handle requests for that specific connection.
        let make_service = make_service_fn(|socket: &AddrStream| {
            info!("remote address: {:?}", socket.remote_addr());

            // Called once for every connection
            let server = server.clone();

            future::ok::<_, Error>(service_fn(move |request| {
                let server = server.clone();
                server.serve_request(request)
            }))
        });

        let hyper_server = HyperServer::try_bind(&addr)?.serve(make_service);
        info!("Listening on http://{}", addr);

        hyper_server
            .with_graceful_shutdown(shutdown)
            .map_err(Error::from)
            .await
    }

    async fn serve_request(self, request: Request<Body>) -> Result<Response<Body>> {
        self.counter.fetch_add(1, Ordering::AcqRel);
        self.route_http_request(request).await
    }

    async fn route_http_request(&self, request: Request<Body>) -> Result<Response<Body>> {
        let on_handler_path = request.uri().path() == &*self.handler_path;

        match request.method() {
            &Method::POST if on_handler_path => self.route_webhook(request).await,
            _ if on_handler_path => Ok(Response::builder()
                .status(StatusCode::METHOD_NOT_ALLOWED)
                .body(Body::empty())?),
            &Method::GET if request.uri().path() == "/" => {
                let count = self.counter.load(Ordering::Relaxed);
                Ok(Response::new(Body::from(format!("Request #{}\n", count))))
            }
            _ => Ok(Response::builder()
                .status(StatusCode::NOT_FOUND)
                .body(Body::empty())?),
        }
    }

    async fn route_webhook(&self, request: Request<Body>) -> Result<Response<Body>> {
        let event = match classify(request, &*self.secret).await? {
            Classification::Event(event) => event,
            Classification::Respond(response) => return Ok(response),
        };

        let log = EventLog::new(&event);
        info!("{} received", log);
        if let Err(e) = self.dispatcher.dispatch(event) {
            error!("{} dispatching: {}", log, e);
        }

        Ok(Response::new(Body::empty()))
    }
}
