//! Interactive terminal studio.

use crate::download::save_image;
use crate::error::Result;
use crate::keygate::{CredentialCapability, CredentialStore};
use crate::session::{Session, Submission};
use crate::ui::intent::{parse_intent, Intent, HELP};
use crate::ui::render::{render, render_checking, render_spinner};
use async_trait::async_trait;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, Mutex};

const SPINNER_INTERVAL: Duration = Duration::from_millis(120);

/// Line source shared by the studio loop and the key prompt.
#[derive(Clone)]
pub struct InputLines {
    rx: Arc<Mutex<mpsc::Receiver<String>>>,
}

impl InputLines {
    /// Wraps an existing channel.
    pub fn from_receiver(rx: mpsc::Receiver<String>) -> Self {
        Self {
            rx: Arc::new(Mutex::new(rx)),
        }
    }

    /// Starts a task forwarding stdin lines.
    pub fn stdin() -> Self {
        let (tx, rx) = mpsc::channel(16);
        tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if tx.send(line).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        tracing::warn!("stopped reading stdin: {e}");
                        break;
                    }
                }
            }
        });
        Self::from_receiver(rx)
    }

    /// Waits for the next line. `None` once input is closed.
    pub async fn next_line(&self) -> Option<String> {
        self.rx.lock().await.recv().await
    }
}

/// Credential picker that asks for a key on the terminal.
pub struct TerminalKeyPrompt {
    input: InputLines,
    store: CredentialStore,
    out: std::sync::Mutex<Box<dyn Write + Send>>,
}

impl TerminalKeyPrompt {
    /// Creates a prompt writing picked keys into `store`. The question goes
    /// to stdout.
    pub fn new(input: InputLines, store: CredentialStore) -> Self {
        Self::with_output(input, store, std::io::stdout())
    }

    /// Like [`TerminalKeyPrompt::new`], asking on `out` instead of stdout.
    pub fn with_output(
        input: InputLines,
        store: CredentialStore,
        out: impl Write + Send + 'static,
    ) -> Self {
        Self {
            input,
            store,
            out: std::sync::Mutex::new(Box::new(out)),
        }
    }

    fn ask(&self) {
        let mut out = match self.out.lock() {
            Ok(out) => out,
            Err(poisoned) => poisoned.into_inner(),
        };
        let written = write!(out, "Paste a Gemini API key (blank keeps the current one): ")
            .and_then(|_| out.flush());
        if let Err(e) = written {
            tracing::warn!("failed to write key prompt: {e}");
        }
    }
}

#[async_trait]
impl CredentialCapability for TerminalKeyPrompt {
    async fn check(&self) -> bool {
        self.store.is_present().await
    }

    async fn request_selection(&self) {
        self.ask();

        match self.input.next_line().await {
            Some(line) if !line.trim().is_empty() => {
                self.store.set(line).await;
                tracing::info!("API key updated from terminal");
            }
            _ => tracing::debug!("key selection left unchanged"),
        }
    }
}

/// The interactive studio: reads intents, drives the session, renders.
pub struct Studio<W: Write> {
    session: Session,
    input: InputLines,
    out: W,
    download_dir: PathBuf,
}

impl<W: Write> Studio<W> {
    /// Creates a studio writing its views to `out`.
    pub fn new(
        session: Session,
        input: InputLines,
        out: W,
        download_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            session,
            input,
            out,
            download_dir: download_dir.into(),
        }
    }

    /// The underlying session.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Consumes the studio, returning its output sink.
    pub fn into_output(self) -> W {
        self.out
    }

    /// Runs until `/quit` or end of input.
    pub async fn run(&mut self) -> Result<()> {
        writeln!(self.out, "{}", render_checking())?;
        self.session.initialize().await;
        self.show()?;

        while let Some(line) = self.input.next_line().await {
            let intent = match parse_intent(&line) {
                Ok(Some(intent)) => intent,
                Ok(None) => continue,
                Err(e) => {
                    writeln!(self.out, "{e}")?;
                    continue;
                }
            };
            match self.handle(intent).await {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => writeln!(self.out, "{e}")?,
            }
        }
        Ok(())
    }

    /// Applies one intent. Returns false when the studio should stop.
    pub async fn handle(&mut self, intent: Intent) -> Result<bool> {
        match intent {
            Intent::SetPrompt(prompt) => {
                self.session.set_prompt(prompt)?;
                let options = self.session.options();
                writeln!(self.out, "Prompt set ({} chars).", options.prompt.chars().count())?;
            }
            Intent::SetSize(size) => {
                self.session.set_size(size)?;
                self.show()?;
            }
            Intent::SetAspectRatio(ratio) => {
                self.session.set_aspect_ratio(ratio)?;
                self.show()?;
            }
            Intent::Generate => self.generate().await?,
            Intent::Select(index) => {
                if self.session.select_history_index(index).is_some() {
                    self.show()?;
                } else {
                    writeln!(self.out, "No history entry {}.", index + 1)?;
                }
            }
            Intent::Download(dir) => self.download(dir).await?,
            Intent::SelectKey => {
                self.session.select_credential().await;
                self.show()?;
            }
            Intent::Show => self.show()?,
            Intent::Help => writeln!(self.out, "{HELP}")?,
            Intent::Quit => return Ok(false),
        }
        Ok(true)
    }

    async fn generate(&mut self) -> Result<()> {
        let options = match self.session.prepare_submit().await {
            Submission::Ready(options) => options,
            Submission::Ignored => {
                writeln!(self.out, "Enter a prompt first.")?;
                return Ok(());
            }
            Submission::Busy => {
                writeln!(self.out, "A generation is already running.")?;
                return Ok(());
            }
            Submission::CredentialRequested => {
                writeln!(self.out)?;
                self.show()?;
                writeln!(self.out, "Key selection finished. Submit again to generate.")?;
                return Ok(());
            }
        };

        self.show()?;
        let provider = self.session.provider();
        let generation = provider.generate(&options);
        tokio::pin!(generation);
        let mut ticker = tokio::time::interval(SPINNER_INTERVAL);
        let mut tick = 0usize;
        let mut input_open = true;

        let result = loop {
            tokio::select! {
                biased;
                result = &mut generation => break result,
                _ = ticker.tick() => {
                    write!(self.out, "\r  {}", render_spinner(tick))?;
                    self.out.flush()?;
                    tick += 1;
                }
                line = self.input.next_line(), if input_open => match line {
                    Some(_) => writeln!(self.out, "\rControls are disabled while generating.")?,
                    None => input_open = false,
                },
            }
        };
        writeln!(self.out)?;

        self.session.complete(&options, result);
        self.show()
    }

    async fn download(&mut self, dir: Option<PathBuf>) -> Result<()> {
        let Some(image) = self.session.current_image() else {
            writeln!(self.out, "Nothing to download yet.")?;
            return Ok(());
        };
        let dir = dir.unwrap_or_else(|| self.download_dir.clone());
        let path = save_image(image, &dir).await?;
        writeln!(self.out, "Saved {}", path.display())?;
        Ok(())
    }

    fn show(&mut self) -> Result<()> {
        writeln!(self.out, "\n{}", render(&self.session))?;
        Ok(())
    }
}
