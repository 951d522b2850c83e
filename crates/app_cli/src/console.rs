//! Interactive terminal front-end.
//!
//! Renders whatever the controller exposes and forwards single-word commands to it.
//! Commands whose control is disabled are refused here and never reach the controller.

use breed_core::{
    Controls, CorrectedLabel, CorrectionPrompt, FlushOutcome, NavigationController,
    NavigationError, Persistence, PromptStep, SavePolicy, SaveState, Step, Verdict,
};
use std::ffi::OsStr;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

/// Hands a URL or folder to the desktop's default application.
pub type Opener = fn(&OsStr) -> io::Result<()>;

pub fn open_with_system(target: &OsStr) -> io::Result<()> {
    open::that(target)
}

pub struct Console<R, W> {
    input: R,
    out: W,
    vocabulary: Vec<String>,
    correction_attempts: u32,
    submission_url: Option<String>,
    output_dir: Option<PathBuf>,
    opener: Opener,
}

enum Command {
    Next,
    Previous,
    Save,
    Correct,
    Incorrect,
    Unknown,
    Submit,
    OpenOutput,
    Help,
    Quit,
}

impl Command {
    fn parse(line: &str) -> Option<Self> {
        Some(match line.trim().to_ascii_lowercase().as_str() {
            "n" | "next" => Command::Next,
            "p" | "prev" | "previous" => Command::Previous,
            "s" | "save" => Command::Save,
            "y" | "correct" => Command::Correct,
            "x" | "incorrect" => Command::Incorrect,
            "u" | "unknown" => Command::Unknown,
            "submit" => Command::Submit,
            "o" | "open" => Command::OpenOutput,
            "h" | "help" | "?" => Command::Help,
            "q" | "quit" | "exit" => Command::Quit,
            _ => return None,
        })
    }
}

impl<R: BufRead, W: Write> Console<R, W> {
    pub fn new(input: R, out: W, vocabulary: Vec<String>) -> Self {
        Self {
            input,
            out,
            vocabulary,
            correction_attempts: 3,
            submission_url: None,
            output_dir: None,
            opener: open_with_system,
        }
    }

    pub fn with_correction_attempts(mut self, attempts: u32) -> Self {
        self.correction_attempts = attempts;
        self
    }

    pub fn with_submission_url(mut self, url: Option<String>) -> Self {
        self.submission_url = url;
        self
    }

    /// Folder opened by the `o` command.
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    pub fn with_opener(mut self, opener: Opener) -> Self {
        self.opener = opener;
        self
    }

    fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    fn ask(&mut self, prompt: &str) -> io::Result<Option<String>> {
        write!(self.out, "{prompt} ")?;
        self.out.flush()?;
        self.read_line()
    }

    fn ask_yes_no(&mut self, prompt: &str) -> io::Result<bool> {
        loop {
            match self.ask(&format!("{prompt} [Y/N]"))? {
                None => return Ok(false),
                Some(answer) => match answer.to_ascii_lowercase().as_str() {
                    "y" | "yes" => return Ok(true),
                    "n" | "no" => return Ok(false),
                    _ => writeln!(self.out, "Error, please try again.")?,
                },
            }
        }
    }

    /// Ask for the save method. `None` when input ends first.
    pub fn choose_policy(&mut self) -> io::Result<Option<SavePolicy>> {
        loop {
            let Some(answer) = self.ask("Select save method: [a]ll, [n]one or [m]anual:")? else {
                return Ok(None);
            };
            match answer.parse::<SavePolicy>() {
                Ok(policy) => return Ok(Some(policy)),
                Err(e) => writeln!(self.out, "{e}")?,
            }
        }
    }

    /// Browse until the user quits or input ends.
    pub fn run<P: Persistence>(
        &mut self,
        nav: &mut NavigationController<P>,
        first: Step,
    ) -> io::Result<()> {
        self.render(nav, &first)?;
        loop {
            let Some(line) = self.ask(">")? else {
                return Ok(());
            };
            if line.is_empty() {
                continue;
            }
            let Some(command) = Command::parse(&line) else {
                writeln!(self.out, "Unknown command `{line}`; type `h` for help.")?;
                continue;
            };
            let controls = nav.controls();
            match command {
                Command::Quit => return Ok(()),
                Command::Help => self.render_help(controls)?,
                Command::Next if controls.next => {
                    let step = nav.next();
                    self.show_step(nav, step)?;
                }
                Command::Previous if controls.previous => {
                    let step = nav.previous();
                    self.show_step(nav, step)?;
                }
                Command::Save if controls.save => match nav.save_current() {
                    Ok(descriptor) => writeln!(self.out, "{}", descriptor.status_line())?,
                    Err(e) => self.report(&e)?,
                },
                Command::Correct | Command::Incorrect | Command::Unknown
                    if controls.evaluation_pending =>
                {
                    let verdict = match command {
                        Command::Correct => Some(Verdict::Correct),
                        Command::Unknown => Some(Verdict::Unknown),
                        _ => self.ask_correction()?.map(Verdict::Incorrect),
                    };
                    if let Some(verdict) = verdict {
                        self.judge(nav, verdict)?;
                    }
                }
                Command::Submit if controls.submit => self.submit(nav)?,
                Command::OpenOutput if self.output_dir.is_some() => self.open_output()?,
                _ => writeln!(self.out, "That action is not available right now.")?,
            }
        }
    }

    fn ask_correction(&mut self) -> io::Result<Option<CorrectedLabel>> {
        if !self.ask_yes_no("Do you know the correct dog breed?")? {
            writeln!(self.out, "Marking this image as unknown is also possible with `u`.")?;
            return Ok(None);
        }
        let mut prompt = CorrectionPrompt::new(self.correction_attempts);
        loop {
            let Some(answer) = self.ask("What was the correct dog breed?")? else {
                return Ok(None);
            };
            match prompt.submit(&answer, &self.vocabulary) {
                PromptStep::Blank => writeln!(self.out, "Please type a breed name.")?,
                PromptStep::Accepted(label) => {
                    if label.prefix().is_some() {
                        writeln!(
                            self.out,
                            "Breed not in the database; it will be submitted as `{}` for review.",
                            label.label()
                        )?;
                    }
                    return Ok(Some(label));
                }
                PromptStep::Retry { attempt, max } => {
                    let again = format!(
                        "Attempt {attempt}/{max}. Dog breed not found in the database. Try again?"
                    );
                    if !self.ask_yes_no(&again)? {
                        writeln!(self.out, "This breed is not yet supported; nothing recorded.")?;
                        return Ok(None);
                    }
                }
            }
        }
    }

    fn judge<P: Persistence>(
        &mut self,
        nav: &mut NavigationController<P>,
        verdict: Verdict,
    ) -> io::Result<()> {
        match nav.judge(verdict) {
            Ok(judgment) => {
                writeln!(self.out, "Recorded `{}`.", judgment.entry.label)?;
                if let Some(descriptor) = &judgment.submission {
                    writeln!(self.out, "{}", descriptor.status_line())?;
                }
                match judgment.advanced {
                    Some(step) => self.render(nav, &step)?,
                    None => {
                        writeln!(self.out, "All images evaluated. Type `submit` to send the log.")?
                    }
                }
                Ok(())
            }
            Err(e) => self.report(&e),
        }
    }

    fn submit<P: Persistence>(&mut self, nav: &mut NavigationController<P>) -> io::Result<()> {
        match nav.submit_log() {
            Ok(FlushOutcome::Written(path)) => {
                writeln!(self.out, "Evaluation log saved to {}", path.display())?;
                if let Some(url) = self.submission_url.clone()
                    && let Err(e) = (self.opener)(OsStr::new(&url))
                {
                    tracing::warn!("could not open {url}: {e}");
                }
                Ok(())
            }
            Ok(FlushOutcome::AlreadyExists(path)) => {
                writeln!(self.out, "Log already submitted ({}).", path.display())
            }
            Err(e) => self.report(&e),
        }
    }

    fn open_output(&mut self) -> io::Result<()> {
        let Some(dir) = self.output_dir.clone() else {
            return Ok(());
        };
        if !dir.is_dir() {
            return writeln!(self.out, "Nothing saved yet; {} does not exist.", dir.display());
        }
        match (self.opener)(dir.as_os_str()) {
            Ok(()) => writeln!(self.out, "Opened {}", dir.display()),
            Err(e) => {
                tracing::warn!("could not open {}: {e}", dir.display());
                writeln!(self.out, "Could not open {}: {e}", dir.display())
            }
        }
    }

    fn show_step<P: Persistence>(
        &mut self,
        nav: &NavigationController<P>,
        step: Result<Step, NavigationError>,
    ) -> io::Result<()> {
        match step {
            Ok(step) => self.render(nav, &step),
            Err(e) => self.report(&e),
        }
    }

    fn report(&mut self, err: &NavigationError) -> io::Result<()> {
        tracing::warn!("{err}");
        writeln!(self.out, "{err}")
    }

    fn render<P: Persistence>(&mut self, nav: &NavigationController<P>, step: &Step) -> io::Result<()> {
        let Some(record) = nav.session().and_then(|s| s.record(step.index)) else {
            return Ok(());
        };
        writeln!(self.out)?;
        writeln!(self.out, "[{}] {}", step.counter(), record.file_name())?;
        writeln!(self.out, "{}", record.headline())?;
        for (rank, alt) in record.alternatives().iter().enumerate() {
            writeln!(
                self.out,
                "  {}. {:<28} {:>7.3}%",
                rank + 1,
                alt.label,
                alt.confidence * 100.0
            )?;
        }
        match &step.save {
            SaveState::Saved(descriptor) => writeln!(self.out, "{}", descriptor.status_line())?,
            SaveState::Failed(msg) => writeln!(self.out, "Saving failed: {msg}")?,
            SaveState::Unsaved => {}
        }
        if let Some(verdict) = &step.verdict {
            writeln!(self.out, "Evaluated: {}", describe(verdict))?;
        }
        self.render_help(nav.controls())
    }

    fn render_help(&mut self, controls: Controls) -> io::Result<()> {
        let mut actions = Vec::new();
        if controls.previous {
            actions.push("[p]revious");
        }
        if controls.next {
            actions.push("[n]ext");
        }
        if controls.save {
            actions.push("[s]ave");
        }
        if controls.evaluation_pending {
            actions.push("correct [y]");
            actions.push("incorrect [x]");
            actions.push("[u]nknown");
        }
        if controls.submit {
            actions.push("submit");
        }
        if self.output_dir.is_some() {
            actions.push("[o]pen output");
        }
        actions.push("[q]uit");
        writeln!(self.out, "{}", actions.join("  "))
    }
}

fn describe(verdict: &Verdict) -> String {
    match verdict {
        Verdict::Correct => "correct".to_string(),
        Verdict::Incorrect(label) => format!("incorrect, actually {}", label.label()),
        Verdict::Unknown => "unknown".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use breed_core::{
        EvaluationLog, FsStore, LogIdentity, PredictionRecord, PredictionSession, Timestamp,
    };
    use image::{DynamicImage, RgbImage};
    use std::cell::RefCell;
    use std::io::Cursor;
    use tempfile::{TempDir, tempdir};

    fn vocabulary() -> Vec<String> {
        vec!["beagle".into(), "pug".into()]
    }

    fn session(n: usize, policy: SavePolicy) -> PredictionSession {
        let records = (0..n)
            .map(|i| {
                let img = DynamicImage::ImageRgb8(RgbImage::new(4, 4));
                let scores: [f32; 2] = if i % 2 == 0 { [0.9, 0.1] } else { [0.3, 0.7] };
                PredictionRecord::from_scores(format!("dog_{i}.jpg"), img, &scores, &vocabulary(), 5)
                    .unwrap()
            })
            .collect();
        let mut session = PredictionSession::new(records);
        session.select_policy(policy).unwrap();
        session
    }

    fn controller(dir: &TempDir) -> NavigationController<FsStore> {
        let root = dir.path();
        NavigationController::new(FsStore::new(
            root.join("output"),
            root.join("subs"),
            root.join("logs"),
        ))
    }

    thread_local! {
        static OPENED: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
    }

    fn record_open(target: &OsStr) -> io::Result<()> {
        OPENED.with(|opened| opened.borrow_mut().push(target.to_string_lossy().into_owned()));
        Ok(())
    }

    fn take_opened() -> Vec<String> {
        OPENED.with(|opened| std::mem::take(&mut *opened.borrow_mut()))
    }

    fn run_script(
        script: &str,
        nav: &mut NavigationController<FsStore>,
        first: Step,
    ) -> String {
        let output_dir = nav.store().output_dir().to_path_buf();
        let mut out = Vec::new();
        let mut console = Console::new(Cursor::new(script.as_bytes().to_vec()), &mut out, vocabulary())
            .with_submission_url(Some("https://example.org".into()))
            .with_output_dir(output_dir)
            .with_opener(record_open);
        console.run(nav, first).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn policy_prompt_retries_until_valid() {
        let mut out = Vec::new();
        let mut console = Console::new(Cursor::new(b"later\nm\n".to_vec()), &mut out, vocabulary());
        assert_eq!(console.choose_policy().unwrap(), Some(SavePolicy::Manual));
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("unknown save policy `later`"));
    }

    #[test]
    fn manual_save_from_console_writes_one_card() {
        let dir = tempdir().unwrap();
        let mut nav = controller(&dir);
        let first = nav.activate(session(2, SavePolicy::Manual), None).unwrap().unwrap();
        let text = run_script("s\ns\nn\np\nq\n", &mut nav, first);
        assert!(text.contains("[1/2] dog_0.jpg"));
        assert!(text.contains("[2/2] dog_1.jpg"));
        assert!(text.contains("Prediction saved to output folder under name: beagle_90.000%_"));
        let written = std::fs::read_dir(dir.path().join("output")).unwrap().count();
        assert_eq!(written, 1);
    }

    #[test]
    fn disabled_actions_are_refused() {
        let dir = tempdir().unwrap();
        let mut nav = controller(&dir);
        let first = nav.activate(session(1, SavePolicy::None), None).unwrap().unwrap();
        let text = run_script("n\ns\nsubmit\nq\n", &mut nav, first);
        assert_eq!(text.matches("That action is not available right now.").count(), 3);
        assert!(!dir.path().join("output").exists());
    }

    #[test]
    fn evaluation_flow_records_and_submits() {
        let dir = tempdir().unwrap();
        let mut nav = controller(&dir);
        let log = EvaluationLog::new(LogIdentity::for_user("cli", Timestamp::now()));
        let first = nav
            .activate(session(2, SavePolicy::None), Some(log))
            .unwrap()
            .unwrap();
        let script = "n\nx\ny\n\nGolden Retriever\ny\ngolden retriever\ny\nGOLDEN RETRIEVER\ny\nsubmit\nsubmit\n";
        let text = run_script(script, &mut nav, first);
        assert!(text.contains("That action is not available right now."));
        assert!(text.contains("Please type a breed name."));
        assert!(text.contains("Attempt 1/3."));
        assert!(text.contains("Recorded `US_golden_retriever`."));
        assert!(text.contains("Recorded `pug`."));
        assert!(text.contains("Evaluation log saved to"));
        assert!(text.contains("Log already submitted"));

        let entries = nav.gate().unwrap().log().entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].label, "US_golden_retriever");
        assert_eq!(entries[1].label, "pug");
    }

    #[test]
    fn open_command_shows_output_folder_once_it_exists() {
        take_opened();
        let dir = tempdir().unwrap();
        let mut nav = controller(&dir);
        let first = nav.activate(session(1, SavePolicy::Manual), None).unwrap().unwrap();
        let text = run_script("o\ns\nopen\nq\n", &mut nav, first);
        let output = dir.path().join("output");
        assert!(text.contains("[o]pen output"));
        assert!(text.contains("Nothing saved yet"));
        assert!(text.contains(&format!("Opened {}", output.display())));
        assert_eq!(take_opened(), vec![output.to_string_lossy().into_owned()]);
    }

    #[test]
    fn open_command_needs_an_output_folder() {
        take_opened();
        let dir = tempdir().unwrap();
        let mut nav = controller(&dir);
        let first = nav.activate(session(1, SavePolicy::None), None).unwrap().unwrap();
        let mut out = Vec::new();
        let mut console = Console::new(Cursor::new(b"o\nq\n".to_vec()), &mut out, vocabulary())
            .with_opener(record_open);
        console.run(&mut nav, first).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("That action is not available right now."));
        assert!(take_opened().is_empty());
    }
}
