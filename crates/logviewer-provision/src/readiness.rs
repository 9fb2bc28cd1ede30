//! Readiness waiting for launched components.
//!
//! A [`ReadinessProbe`] answers "is it up yet?" once per attempt and
//! [`wait_until_ready`] polls it under a [`WaitPolicy`]: growing intervals,
//! an overall deadline and an optional attempt cap. The launched process is
//! checked before each attempt so a crashed child fails the wait at once.

use std::io;
use std::net::{TcpStream, ToSocketAddrs};
use std::thread;
use std::time::{Duration, Instant};

use logviewer_fetch::capped_delay;
use logviewer_platform::{ReadinessSpec, ReadinessTarget};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, trace};

use crate::effects::ManagedProcess;

const MIN_ATTEMPT_TIMEOUT: Duration = Duration::from_millis(10);

#[derive(Debug, Error)]
pub enum WaitError {
    #[error("{target} not ready after {attempts} attempt(s) in {elapsed:?}")]
    TimedOut {
        target: String,
        attempts: u32,
        elapsed: Duration,
    },

    #[error("process exited before becoming ready (exit code {code:?})")]
    ProcessExited { code: Option<i32> },

    #[error("cannot query process status")]
    Status(#[source] io::Error),

    #[error("cannot create readiness probe")]
    Probe(#[source] io::Error),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadinessMode {
    /// Poll the component's TCP or HTTP endpoint.
    #[default]
    Probe,
    /// Wait out the full timeout without polling anything.
    Delay,
}

pub trait ReadinessProbe {
    fn describe(&self) -> String;

    /// One attempt, bounded by `timeout`.
    fn check(&mut self, timeout: Duration) -> bool;
}

/// Ready once a TCP connection is accepted.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    host: String,
    port: u16,
}

impl TcpProbe {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl ReadinessProbe for TcpProbe {
    fn describe(&self) -> String {
        format!("tcp://{}:{}", self.host, self.port)
    }

    fn check(&mut self, timeout: Duration) -> bool {
        let addrs = match (self.host.as_str(), self.port).to_socket_addrs() {
            Ok(addrs) => addrs,
            Err(e) => {
                debug!(host = %self.host, error = %e, "cannot resolve");
                return false;
            }
        };
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(_) => return true,
                Err(e) => trace!(%addr, error = %e, "connect failed"),
            }
        }
        false
    }
}

/// Ready once the URL answers with a status below 500.
pub struct HttpProbe {
    url: String,
    client: reqwest::Client,
    runtime: tokio::runtime::Runtime,
}

impl HttpProbe {
    pub fn new(url: impl Into<String>) -> io::Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let client = {
            let _runtime = runtime.enter();
            reqwest::Client::builder().build().map_err(io::Error::other)?
        };
        Ok(Self {
            url: url.into(),
            client,
            runtime,
        })
    }
}

impl ReadinessProbe for HttpProbe {
    fn describe(&self) -> String {
        self.url.clone()
    }

    fn check(&mut self, timeout: Duration) -> bool {
        let (client, url) = (&self.client, &self.url);
        // The request's timer must be created inside the runtime.
        let response = self
            .runtime
            .block_on(async { client.get(url).timeout(timeout).send().await });
        match response {
            Ok(response) => {
                let status = response.status();
                trace!(url = %self.url, %status, "probe response");
                !status.is_server_error()
            }
            Err(e) => {
                trace!(url = %self.url, error = %e, "probe request failed");
                false
            }
        }
    }
}

/// Reports ready once `delay` has passed since the probe was created.
#[derive(Debug, Clone)]
pub struct DelayProbe {
    delay: Duration,
    created: Instant,
}

impl DelayProbe {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            created: Instant::now(),
        }
    }
}

impl ReadinessProbe for DelayProbe {
    fn describe(&self) -> String {
        format!("fixed delay of {:?}", self.delay)
    }

    fn check(&mut self, _timeout: Duration) -> bool {
        self.created.elapsed() >= self.delay
    }
}

/// Builds the probe for a component's readiness target.
pub trait ProbeFactory {
    fn probe(&self, spec: &ReadinessSpec) -> io::Result<Box<dyn ReadinessProbe>>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProbes {
    pub mode: ReadinessMode,
}

impl ProbeFactory for SystemProbes {
    fn probe(&self, spec: &ReadinessSpec) -> io::Result<Box<dyn ReadinessProbe>> {
        Ok(match (self.mode, &spec.target) {
            (ReadinessMode::Delay, _) => Box::new(DelayProbe::new(spec.timeout)),
            (ReadinessMode::Probe, ReadinessTarget::Tcp { host, port }) => {
                Box::new(TcpProbe::new(host.clone(), *port))
            }
            (ReadinessMode::Probe, ReadinessTarget::Http { url }) => Box::new(HttpProbe::new(url.clone())?),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WaitPolicy {
    /// Pause after the first failed attempt; doubles afterwards.
    pub interval: Duration,
    pub max_interval: Duration,
    pub attempt_timeout: Duration,
    /// Overall deadline.
    pub timeout: Duration,
    pub max_attempts: Option<u32>,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(500),
            max_interval: Duration::from_secs(5),
            attempt_timeout: Duration::from_secs(2),
            timeout: Duration::from_secs(60),
            max_attempts: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ready {
    pub attempts: u32,
    pub elapsed: Duration,
}

/// Poll `probe` until it succeeds, the policy gives up, or `process` exits.
pub fn wait_until_ready(
    probe: &mut dyn ReadinessProbe,
    policy: &WaitPolicy,
    mut process: Option<&mut dyn ManagedProcess>,
) -> Result<Ready, WaitError> {
    let start = Instant::now();
    let mut attempts = 0u32;
    loop {
        if let Some(process) = process.as_mut()
            && let Some(exited) = process.try_wait().map_err(WaitError::Status)?
        {
            return Err(WaitError::ProcessExited { code: exited.code });
        }

        attempts += 1;
        let elapsed = start.elapsed();
        let remaining = policy.timeout.saturating_sub(elapsed);
        let attempt_timeout = policy.attempt_timeout.min(remaining).max(MIN_ATTEMPT_TIMEOUT);
        if probe.check(attempt_timeout) {
            return Ok(Ready {
                attempts,
                elapsed: start.elapsed(),
            });
        }

        // Judged by the attempt's start: the last attempt runs at or after the deadline.
        let exhausted = policy.max_attempts.is_some_and(|max| attempts >= max);
        if elapsed >= policy.timeout || exhausted {
            return Err(WaitError::TimedOut {
                target: probe.describe(),
                attempts,
                elapsed: start.elapsed(),
            });
        }

        let delay = capped_delay(attempts - 1, policy.interval, policy.max_interval)
            .min(policy.timeout.saturating_sub(start.elapsed()));
        trace!(probe = %probe.describe(), attempts, ?delay, "not ready yet");
        thread::sleep(delay);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::Exited;
    use std::io::{Read, Write};
    use std::net::TcpListener;

    fn quick(timeout: Duration) -> WaitPolicy {
        WaitPolicy {
            interval: Duration::from_millis(10),
            max_interval: Duration::from_millis(40),
            attempt_timeout: Duration::from_millis(100),
            timeout,
            max_attempts: None,
        }
    }

    struct Never;

    impl ReadinessProbe for Never {
        fn describe(&self) -> String {
            "never".into()
        }

        fn check(&mut self, _timeout: Duration) -> bool {
            false
        }
    }

    struct ExitedProcess;

    impl ManagedProcess for ExitedProcess {
        fn id(&self) -> u32 {
            42
        }

        fn try_wait(&mut self) -> io::Result<Option<Exited>> {
            Ok(Some(Exited { code: Some(1) }))
        }

        fn terminate(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn closed_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    }

    /// Answers `count` HTTP requests with `status_line` from a background thread.
    fn serve(status_line: &'static str, count: usize) -> (String, thread::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/", listener.local_addr().unwrap());
        let handle = thread::spawn(move || {
            for stream in listener.incoming().take(count) {
                let mut stream = stream.unwrap();
                let mut buf = [0u8; 1024];
                let _ = stream.read(&mut buf);
                let response =
                    format!("HTTP/1.1 {status_line}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n");
                stream.write_all(response.as_bytes()).unwrap();
            }
        });
        (url, handle)
    }

    #[test]
    fn tcp_probe_times_out_on_closed_port() {
        let mut probe = TcpProbe::new("127.0.0.1", closed_port());
        let result = wait_until_ready(&mut probe, &quick(Duration::from_millis(300)), None);

        match result {
            Err(WaitError::TimedOut { attempts, elapsed, .. }) => {
                assert!(attempts > 1);
                assert!(elapsed >= Duration::from_millis(300));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[test]
    fn tcp_probe_succeeds_against_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let mut probe = TcpProbe::new("127.0.0.1", port);

        let ready = wait_until_ready(&mut probe, &quick(Duration::from_secs(5)), None).unwrap();
        assert_eq!(ready.attempts, 1);
    }

    #[test]
    fn exited_process_fails_fast() {
        let mut process = ExitedProcess;
        let start = Instant::now();
        let result = wait_until_ready(&mut Never, &quick(Duration::from_secs(30)), Some(&mut process));

        assert!(matches!(result, Err(WaitError::ProcessExited { code: Some(1) })));
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn attempts_are_bounded() {
        let mut policy = quick(Duration::from_secs(30));
        policy.max_attempts = Some(3);

        let result = wait_until_ready(&mut Never, &policy, None);
        assert!(matches!(result, Err(WaitError::TimedOut { attempts: 3, .. })));
    }

    #[test]
    fn delay_probe_waits_out_the_delay() {
        let mut probe = DelayProbe::new(Duration::from_millis(100));
        let ready = wait_until_ready(&mut probe, &quick(Duration::from_millis(100)), None).unwrap();
        assert!(ready.elapsed >= Duration::from_millis(100));
    }

    #[test]
    fn http_probe_accepts_success() {
        let (url, server) = serve("200 OK", 1);
        let mut probe = HttpProbe::new(url).unwrap();
        assert!(probe.check(Duration::from_secs(5)));
        server.join().unwrap();
    }

    #[test]
    fn http_probe_rejects_unavailable() {
        let (url, server) = serve("503 Service Unavailable", 1);
        let mut probe = HttpProbe::new(url).unwrap();
        assert!(!probe.check(Duration::from_secs(5)));
        server.join().unwrap();
    }

    #[test]
    fn http_probe_fails_on_closed_port() {
        let mut probe = HttpProbe::new(format!("http://127.0.0.1:{}/", closed_port())).unwrap();
        assert!(!probe.check(Duration::from_millis(500)));
    }

    #[test]
    fn system_probes_wait_for_http_listener() {
        let (url, server) = serve("302 Found", 1);
        let spec = ReadinessSpec {
            target: ReadinessTarget::Http { url },
            timeout: Duration::from_secs(5),
        };

        let mut policy = quick(spec.timeout);
        policy.attempt_timeout = Duration::from_secs(2);

        let mut probe = SystemProbes::default().probe(&spec).unwrap();
        let ready = wait_until_ready(probe.as_mut(), &policy, None).unwrap();

        assert_eq!(ready.attempts, 1);
        server.join().unwrap();
    }

    #[test]
    fn factory_honours_mode() {
        let spec = ReadinessSpec {
            target: ReadinessTarget::Tcp {
                host: "127.0.0.1".into(),
                port: 9200,
            },
            timeout: Duration::from_secs(60),
        };
        let delay = SystemProbes {
            mode: ReadinessMode::Delay,
        };
        assert!(delay.probe(&spec).unwrap().describe().starts_with("fixed delay"));
        let probe = SystemProbes::default().probe(&spec).unwrap();
        assert_eq!(probe.describe(), "tcp://127.0.0.1:9200");
    }
}
