//! upsd client performing one `LIST VAR` exchange per scrape.

use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use sensor_framework::{
    Collector, CollectorOptions, LabelSet, ScrapeError, ScrapeOutcome, write_sample,
};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, trace};

use crate::error::UpscError;
use crate::mapping::{metric_for, status_code};
use crate::target::UpsTarget;

/// Collector for one UPS served by a upsd daemon.
#[derive(Debug)]
pub struct UpscCollector {
    target: UpsTarget,
    name: String,
    labels: LabelSet,
    pattern: Regex,
    begin: String,
    end: String,
    timeout: Duration,
}

impl UpscCollector {
    /// Create a collector from `ups[@host[:port]]` options.
    ///
    /// No connection is made here; see [`Collector::probe`].
    pub fn new(options: &CollectorOptions) -> Result<Self, UpscError> {
        let target = UpsTarget::parse(&options.opts)?;

        // Response lines look like: VAR main ups.load "14"
        let pattern = format!(
            r#"^VAR {} ([a-zA-Z0-9._-]+) "(.*)"$"#,
            regex::escape(&target.ups)
        );
        let pattern = Regex::new(&pattern).map_err(|source| UpscError::Pattern {
            pattern: pattern.clone(),
            source,
        })?;

        let labels = options.labels.clone().unwrap_or_else(|| target.labels());

        Ok(Self {
            name: format!("{}@{}", target.ups, target.address()),
            begin: format!("BEGIN LIST VAR {}", target.ups),
            end: format!("END LIST VAR {}", target.ups),
            target,
            labels,
            pattern,
            timeout: options.timeout,
        })
    }

    /// The UPS this collector talks to.
    pub fn target(&self) -> &UpsTarget {
        &self.target
    }

    async fn connect(&self) -> Result<TcpStream, ScrapeError> {
        let address = self.target.address();
        timeout(self.timeout, TcpStream::connect(&address))
            .await
            .map_err(|_| ScrapeError::timeout("connect", self.timeout))?
            .map_err(|source| ScrapeError::Connect {
                target: address,
                source,
            })
    }

    /// Run one `LIST VAR` exchange over an open stream.
    ///
    /// The stream is dropped, and so closed, on every return path.
    pub async fn exchange<S>(&self, stream: S) -> ScrapeOutcome
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut reader = BufReader::new(stream);
        let mut line = String::new();

        let request = format!("LIST VAR {}\n", self.target.ups);
        if let Err(e) = self.send(reader.get_mut(), &request).await {
            return ScrapeOutcome::Failed(e);
        }

        if let Err(e) = self.read_line(&mut reader, &mut line).await {
            return ScrapeOutcome::Failed(e);
        }
        if let Err(e) = self.check_begin(&line) {
            return ScrapeOutcome::Failed(e);
        }

        let mut fragment = String::new();
        loop {
            if let Err(e) = self.read_line(&mut reader, &mut line).await {
                return ScrapeOutcome::Failed(e);
            }

            if line == self.end {
                break;
            }

            let Some(caps) = self.pattern.captures(&line) else {
                trace!(collector = %self.name, line = %line, "Ignoring unmatched line");
                continue;
            };
            let (field, raw) = (&caps[1], &caps[2]);

            let Some(metric) = metric_for(field) else {
                trace!(collector = %self.name, field, "Ignoring unexported variable");
                continue;
            };

            let value = match status_code(raw) {
                Some(code) => code,
                None => match raw.parse::<f64>() {
                    Ok(value) => value,
                    Err(e) => {
                        return ScrapeOutcome::Partial {
                            fragment,
                            error: ScrapeError::Data {
                                field: field.to_string(),
                                value: raw.to_string(),
                                message: e.to_string(),
                            },
                        };
                    }
                },
            };

            write_sample(&mut fragment, metric, &self.labels, value);
        }

        debug!(
            collector = %self.name,
            samples = fragment.lines().count(),
            "Read UPS variables"
        );
        ScrapeOutcome::Complete(fragment)
    }

    async fn send<W>(&self, writer: &mut W, request: &str) -> Result<(), ScrapeError>
    where
        W: AsyncWrite + Unpin,
    {
        timeout(self.timeout, async {
            writer.write_all(request.as_bytes()).await?;
            writer.flush().await
        })
        .await
        .map_err(|_| ScrapeError::timeout("write", self.timeout))??;
        Ok(())
    }

    /// Read one line into `line`, without its terminator.
    async fn read_line<R>(&self, reader: &mut R, line: &mut String) -> Result<(), ScrapeError>
    where
        R: AsyncBufRead + Unpin,
    {
        line.clear();
        let n = timeout(self.timeout, reader.read_line(line))
            .await
            .map_err(|_| ScrapeError::timeout("read", self.timeout))??;

        if n == 0 {
            return Err(ScrapeError::UnexpectedEof);
        }

        let trimmed = line.trim_end_matches(['\r', '\n']).len();
        line.truncate(trimmed);
        Ok(())
    }

    fn check_begin(&self, line: &str) -> Result<(), ScrapeError> {
        if line == self.begin {
            return Ok(());
        }

        if line.starts_with("ERR UNKNOWN-UPS") {
            return Err(ScrapeError::protocol(format!(
                "upsd does not know UPS '{}'",
                self.target.ups
            )));
        }

        if let Some(code) = line.strip_prefix("ERR ") {
            return Err(ScrapeError::protocol(format!("upsd returned error {}", code)));
        }

        Err(ScrapeError::protocol(format!(
            "unexpected response {:?}",
            line
        )))
    }
}

#[async_trait]
impl Collector for UpscCollector {
    fn name(&self) -> &str {
        &self.name
    }

    fn labels(&self) -> &LabelSet {
        &self.labels
    }

    async fn probe(&mut self) -> Result<(), ScrapeError> {
        self.connect().await.map(drop)
    }

    async fn scrape(&mut self) -> ScrapeOutcome {
        match self.connect().await {
            Ok(stream) => self.exchange(stream).await,
            Err(e) => ScrapeOutcome::Failed(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, duplex};

    fn collector(opts: &str) -> UpscCollector {
        UpscCollector::new(&CollectorOptions::new(opts).with_timeout(Duration::from_millis(200)))
            .unwrap()
    }

    /// Answer one request on the daemon side of a duplex pipe.
    fn serve(daemon: DuplexStream, expected_request: &'static str, response: &'static str) {
        tokio::spawn(async move {
            let mut daemon = BufReader::new(daemon);
            let mut request = String::new();
            daemon.read_line(&mut request).await.unwrap();
            assert_eq!(request, expected_request);
            daemon.get_mut().write_all(response.as_bytes()).await.unwrap();
            // Keep the pipe open until the client hangs up
            let mut rest = String::new();
            let _ = daemon.read_line(&mut rest).await;
        });
    }

    async fn run(opts: &str, response: &'static str) -> ScrapeOutcome {
        let c = collector(opts);
        let (client, daemon) = duplex(4096);
        serve(daemon, "LIST VAR main\n", response);
        c.exchange(client).await
    }

    #[test]
    fn test_new_defaults() {
        let c = collector("main");
        assert_eq!(c.name(), "main@localhost:3493");
        assert_eq!(c.labels().as_str(), "{ups=\"main\"}");
        assert_eq!(c.begin, "BEGIN LIST VAR main");
        assert_eq!(c.end, "END LIST VAR main");
    }

    #[test]
    fn test_new_with_label_override() {
        let options = CollectorOptions::new("main@nas:3500")
            .with_labels(LabelSet::new().with("site", "lab"));
        let c = UpscCollector::new(&options).unwrap();

        assert_eq!(c.name(), "main@nas:3500");
        assert_eq!(c.labels().as_str(), "{site=\"lab\"}");
    }

    #[test]
    fn test_new_rejects_bad_options() {
        let err = UpscCollector::new(&CollectorOptions::new("a@b@c")).unwrap_err();
        assert!(matches!(err, UpscError::InvalidOptions { .. }));
    }

    #[test]
    fn test_pattern_escapes_ups_name() {
        let c = collector("ups.1");
        assert!(c.pattern.is_match("VAR ups.1 ups.load \"1\""));
        assert!(!c.pattern.is_match("VAR upsX1 ups.load \"1\""));
    }

    #[tokio::test]
    async fn test_exchange_reads_mapped_values() {
        let outcome = run(
            "main@nas",
            "BEGIN LIST VAR main\n\
             VAR main battery.charge \"42\"\n\
             VAR main ups.status \"OL\"\n\
             VAR main ups.beeper.status \"disabled\"\n\
             END LIST VAR main\n",
        )
        .await;

        let ScrapeOutcome::Complete(fragment) = outcome else {
            panic!("expected complete outcome");
        };
        assert_eq!(
            fragment,
            "upsc_battery_charge{ups=\"main\",host=\"nas\"} 42.00\n\
             upsc_ups_online{ups=\"main\",host=\"nas\"} 2.00\n\
             upsc_ups_beeper_enabled{ups=\"main\",host=\"nas\"} 0.00\n"
        );
    }

    #[tokio::test]
    async fn test_exchange_accepts_crlf() {
        let outcome = run(
            "main",
            "BEGIN LIST VAR main\r\nVAR main ups.load \"14\"\r\nEND LIST VAR main\r\n",
        )
        .await;

        assert!(!outcome.is_incident());
        assert_eq!(outcome.fragment(), "upsc_ups_load{ups=\"main\"} 14.00\n");
    }

    #[tokio::test]
    async fn test_exchange_ignores_unknown_fields() {
        let outcome = run(
            "main",
            "BEGIN LIST VAR main\n\
             VAR main device.mfr \"ACME\"\n\
             VAR main ups.load \"14\"\n\
             END LIST VAR main\n",
        )
        .await;

        assert!(!outcome.is_incident());
        assert_eq!(outcome.fragment(), "upsc_ups_load{ups=\"main\"} 14.00\n");
    }

    #[tokio::test]
    async fn test_exchange_empty_list() {
        let outcome = run("main", "BEGIN LIST VAR main\nEND LIST VAR main\n").await;

        assert!(matches!(&outcome, ScrapeOutcome::Complete(f) if f.is_empty()));
    }

    #[tokio::test]
    async fn test_exchange_keeps_values_before_parse_error() {
        let outcome = run(
            "main",
            "BEGIN LIST VAR main\n\
             VAR main ups.load \"14\"\n\
             VAR main ups.status \"OL CHRG RB\"\n\
             VAR main battery.charge \"100\"\n\
             END LIST VAR main\n",
        )
        .await;

        match outcome {
            ScrapeOutcome::Partial { fragment, error } => {
                assert_eq!(fragment, "upsc_ups_load{ups=\"main\"} 14.00\n");
                assert_eq!(error.category(), "data");
            }
            other => panic!("expected partial outcome, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_exchange_unknown_ups() {
        let outcome = run("main", "ERR UNKNOWN-UPS\n").await;

        let ScrapeOutcome::Failed(error) = outcome else {
            panic!("expected failure");
        };
        assert_eq!(error.category(), "protocol");
        assert!(error.to_string().contains("does not know UPS 'main'"));
    }

    #[tokio::test]
    async fn test_exchange_unexpected_begin() {
        let outcome = run("main", "BEGIN LIST VAR other\n").await;
        assert!(matches!(outcome, ScrapeOutcome::Failed(ScrapeError::Protocol(_))));
    }

    #[tokio::test]
    async fn test_exchange_truncated_response() {
        let c = collector("main");
        let (client, daemon) = duplex(4096);
        tokio::spawn(async move {
            let mut daemon = BufReader::new(daemon);
            let mut request = String::new();
            daemon.read_line(&mut request).await.unwrap();
            daemon
                .get_mut()
                .write_all(b"BEGIN LIST VAR main\nVAR main ups.load \"14\"\n")
                .await
                .unwrap();
            // Dropping the daemon side closes the pipe mid-list
        });

        let outcome = c.exchange(client).await;
        assert!(matches!(outcome, ScrapeOutcome::Failed(ScrapeError::UnexpectedEof)));
        assert_eq!(outcome.fragment(), "");
    }

    #[tokio::test]
    async fn test_exchange_read_timeout() {
        let c = collector("main");
        let (client, _daemon) = duplex(4096);

        let outcome = c.exchange(client).await;
        assert!(matches!(
            outcome,
            ScrapeOutcome::Failed(ScrapeError::Timeout { operation: "read", .. })
        ));
    }
}
