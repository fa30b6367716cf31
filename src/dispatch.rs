//! Single-attempt dispatch and outcome classification.

// self
use crate::{
	_prelude::*,
	attach,
	auth::Credentials,
	error::TransportError,
	http::{HttpResponse, HttpTransport},
	request::RequestDescriptor,
};

/// Runs one attempt of a descriptor: attach, send under the per-attempt timeout, classify
/// transport failures.
///
/// The dispatcher never retries. A timeout on any attempt (original, refresh, or replay) is
/// reported as [`Error::Timeout`] and left to the caller.
pub struct Dispatcher<T>
where
	T: ?Sized + HttpTransport,
{
	transport: Arc<T>,
	attempt_timeout: Duration,
}
impl<T> Dispatcher<T>
where
	T: ?Sized + HttpTransport,
{
	/// Creates a dispatcher over `transport` with a fixed per-attempt budget.
	pub fn new(transport: impl Into<Arc<T>>, attempt_timeout: Duration) -> Self {
		Self { transport: transport.into(), attempt_timeout }
	}

	/// Shared transport handle.
	pub fn transport(&self) -> &Arc<T> {
		&self.transport
	}

	/// Per-attempt budget.
	pub fn attempt_timeout(&self) -> Duration {
		self.attempt_timeout
	}

	/// Sends `descriptor` with the credential `snapshot` taken by the caller.
	///
	/// Any response that arrives is returned as `Ok`, whatever its status; see [`classify`].
	pub async fn dispatch(
		&self,
		descriptor: &RequestDescriptor,
		snapshot: &Credentials,
	) -> Result<HttpResponse> {
		let prepared = attach::attach_credentials(descriptor, snapshot)?;

		match tokio::time::timeout(self.attempt_timeout, self.transport.send(prepared)).await {
			Ok(Ok(response)) => Ok(response),
			Ok(Err(TransportError::TimedOut { .. })) | Err(_) =>
				Err(Error::Timeout { timeout: self.attempt_timeout }),
			Ok(Err(err)) => Err(Error::Network(err)),
		}
	}
}
impl<T> Clone for Dispatcher<T>
where
	T: ?Sized + HttpTransport,
{
	fn clone(&self) -> Self {
		Self { transport: self.transport.clone(), attempt_timeout: self.attempt_timeout }
	}
}
impl<T> Debug for Dispatcher<T>
where
	T: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Dispatcher").field("attempt_timeout", &self.attempt_timeout).finish()
	}
}

/// Passes 2xx responses through and turns every other status into [`Error::HttpStatus`].
pub fn classify(response: HttpResponse) -> Result<HttpResponse> {
	if response.status().is_success() {
		Ok(response)
	} else {
		Err(Error::HttpStatus { code: response.status().as_u16(), body: response.text() })
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{attach::PreparedRequest, auth::TokenPair, http::TransportFuture};

	enum Behavior {
		Respond(StatusCode),
		Hang,
		Refuse,
		TransportDeadline,
	}

	struct StubTransport {
		behavior: Behavior,
		seen: Mutex<Vec<PreparedRequest>>,
	}
	impl StubTransport {
		fn new(behavior: Behavior) -> Self {
			Self { behavior, seen: Mutex::new(Vec::new()) }
		}
	}
	impl HttpTransport for StubTransport {
		fn send(&self, request: PreparedRequest) -> TransportFuture<'_> {
			let path = request.path.clone();

			self.seen.lock().push(request);

			Box::pin(async move {
				match self.behavior {
					Behavior::Respond(status) => Ok(HttpResponse::with_status(status, "payload")),
					Behavior::Hang => {
						std::future::pending::<()>().await;

						unreachable!("A pending future never resolves.")
					},
					Behavior::Refuse => Err(TransportError::Io(std::io::Error::new(
						std::io::ErrorKind::ConnectionRefused,
						"refused",
					))),
					Behavior::TransportDeadline => Err(TransportError::TimedOut { path }),
				}
			})
		}
	}

	fn snapshot() -> Credentials {
		TokenPair::new("access", "refresh").into()
	}

	#[tokio::test]
	async fn dispatch_attaches_the_snapshot() {
		let transport = Arc::new(StubTransport::new(Behavior::Respond(StatusCode::OK)));
		let dispatcher = Dispatcher::<StubTransport>::new(transport.clone(), Duration::from_secs(1));
		let response = dispatcher
			.dispatch(&RequestDescriptor::new(Method::GET, "/orders"), &snapshot())
			.await
			.expect("Stub transport should respond.");

		assert_eq!(response.status(), StatusCode::OK);
		assert_eq!(transport.seen.lock()[0].bearer(), Some("access"));
	}

	#[tokio::test]
	async fn hung_attempts_time_out() {
		let dispatcher =
			Dispatcher::new(StubTransport::new(Behavior::Hang), Duration::from_millis(20));
		let err = dispatcher
			.dispatch(&RequestDescriptor::new(Method::GET, "/orders"), &snapshot())
			.await
			.expect_err("Hung transport should time out.");

		assert!(matches!(err, Error::Timeout { timeout } if timeout == Duration::from_millis(20)));
	}

	#[tokio::test]
	async fn transport_failures_are_classified() {
		let refused =
			Dispatcher::new(StubTransport::new(Behavior::Refuse), Duration::from_secs(1));
		let deadline =
			Dispatcher::new(StubTransport::new(Behavior::TransportDeadline), Duration::from_secs(1));
		let descriptor = RequestDescriptor::new(Method::GET, "/orders");

		assert!(matches!(
			refused.dispatch(&descriptor, &snapshot()).await,
			Err(Error::Network(TransportError::Io(_)))
		));
		assert!(matches!(
			deadline.dispatch(&descriptor, &snapshot()).await,
			Err(Error::Timeout { .. })
		));
	}

	#[test]
	fn classify_maps_non_success_statuses() {
		let ok = classify(HttpResponse::with_status(StatusCode::NO_CONTENT, ""));
		let err = classify(HttpResponse::with_status(StatusCode::CONFLICT, "slot taken"))
			.expect_err("409 should be an error.");

		assert!(ok.is_ok());
		assert!(matches!(err, Error::HttpStatus { code: 409, ref body } if body == "slot taken"));
	}
}
