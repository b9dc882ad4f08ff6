//! Line-oriented interactive session over a [`DashboardState`].
//!
//! Each command changes the selection or prints one result, the way a
//! dashboard re-renders on every widget change.

use std::io::{BufRead, Write};
use std::path::Path;

use anyhow::{anyhow, bail, Result};
use log::debug;

use crate::data::aggregate::{scatter, Dimension, Measure};
use crate::data::export::export_csv;
use crate::error::QueryError;
use crate::report::{
    build_report, render_domains, render_factors, render_group, render_ratio, render_report,
    render_scatter, render_trend, OutputFormat, ReportSettings,
};
use crate::state::DashboardState;

const HELP: &str = "\
commands:
  summary                         KPIs, top regions, factor breakdown, trend
  domains                         list years, regions and factors
  selection                       show the current selection
  year <y>                        toggle a year
  region <name>                   toggle a region
  factor <name>                   toggle a factor
  all years|regions|factors       select everything
  none years|regions|factors      select nothing
  group year|region <measure> [mean]
  factors [k]                     factor ranking, or top k + Other
  trend [k]                       per-year top k + Other
  ratio [year|region]
  scatter <factor x> , <factor y>
  export <path>                   write the selected rows as CSV
  format text|json
  reload                          re-read the source file
  help
  quit";

/// Outcome of one command line.
#[derive(Debug, PartialEq, Eq)]
pub enum Step {
    Continue,
    Quit,
}

pub struct Shell {
    pub state: DashboardState,
    pub settings: ReportSettings,
    pub format: OutputFormat,
}

impl Shell {
    pub fn new(state: DashboardState, settings: ReportSettings, format: OutputFormat) -> Self {
        Self {
            state,
            settings,
            format,
        }
    }

    /// Read commands until end of input or `quit`. Command errors are
    /// printed and the session continues.
    pub fn run<R: BufRead, W: Write>(&mut self, input: R, mut output: W) -> Result<()> {
        writeln!(output, "type 'help' for commands")?;
        for line in input.lines() {
            let line = line?;
            match self.execute(&line, &mut output) {
                Ok(Step::Quit) => break,
                Ok(Step::Continue) => {}
                Err(e) => writeln!(output, "error: {e}")?,
            }
        }
        Ok(())
    }

    /// Execute one command line.
    pub fn execute<W: Write>(&mut self, line: &str, output: &mut W) -> Result<Step> {
        let line = line.trim();
        let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
        let rest = rest.trim();
        debug!("shell command '{command}' args '{rest}'");

        match command {
            "" => {}
            "help" => writeln!(output, "{HELP}")?,
            "quit" | "exit" => return Ok(Step::Quit),
            "reload" => {
                self.state.reload()?;
                writeln!(output, "reloaded {}", self.state.cache.source().display())?;
            }
            "format" => {
                self.format = match rest {
                    "text" => OutputFormat::Text,
                    "json" => OutputFormat::Json,
                    other => bail!("unknown format '{other}'"),
                };
            }
            "year" => {
                let year = rest
                    .parse()
                    .map_err(|_| anyhow!("'{rest}' is not a year"))?;
                self.state.toggle_year(year);
                self.print_status(output)?;
            }
            "region" => {
                self.state.toggle_region(rest);
                self.print_status(output)?;
            }
            "factor" => self.state.toggle_factor(rest)?,
            "all" | "none" => {
                let all = command == "all";
                match (rest, all) {
                    ("years", true) => self.state.select_all_years(),
                    ("years", false) => self.state.select_no_years(),
                    ("regions", true) => self.state.select_all_regions(),
                    ("regions", false) => self.state.select_no_regions(),
                    ("factors", true) => self.state.select_all_factors(),
                    ("factors", false) => self.state.select_no_factors(),
                    _ => bail!("expected years, regions or factors"),
                }
                self.print_status(output)?;
            }
            "selection" => self.print_selection(output)?,
            "domains" => {
                let ds = self
                    .state
                    .dataset
                    .as_deref()
                    .ok_or(QueryError::NoDataLoaded)?;
                write!(output, "{}", render_domains(ds, self.format)?)?;
            }
            _ => self.query(command, rest, output)?,
        }
        Ok(Step::Continue)
    }

    fn query<W: Write>(&self, command: &str, rest: &str, output: &mut W) -> Result<()> {
        const QUERIES: [&str; 7] = [
            "summary", "group", "factors", "trend", "ratio", "scatter", "export",
        ];
        if !QUERIES.contains(&command) {
            bail!("unknown command '{command}', try 'help'");
        }
        let view = self.state.view()?;
        let text = match command {
            "summary" => {
                let report = build_report(&view, &self.settings);
                render_report(&report, view.dataset(), self.format)?
            }
            "group" => {
                let mut args = rest.splitn(2, ' ');
                let dim = parse_dimension(args.next().unwrap_or(""))?;
                let tail = args.next().unwrap_or("").trim();
                let (measure, mean) = match tail.strip_suffix(" mean") {
                    Some(m) => (m.trim(), true),
                    None => (tail, false),
                };
                let measure = Measure::parse(view.dataset(), measure)?;
                render_group(&view, dim, measure, mean, self.format)?
            }
            "factors" => render_factors(&view, parse_k(rest)?, self.format)?,
            "trend" => {
                let k = parse_k(rest)?.unwrap_or(self.settings.top_k);
                render_trend(&view, k, self.format)?
            }
            "ratio" => {
                let by = if rest.is_empty() {
                    None
                } else {
                    Some(parse_dimension(rest)?)
                };
                render_ratio(&view, by, self.format)?
            }
            "scatter" => {
                let (x, y) = rest
                    .split_once(',')
                    .ok_or_else(|| anyhow!("usage: scatter <factor x> , <factor y>"))?;
                let (x, y) = (x.trim(), y.trim());
                let points = scatter(&view, x, y)?;
                render_scatter(view.dataset(), &points, x, y, self.format)?
            }
            "export" => {
                if rest.is_empty() {
                    bail!("usage: export <path>");
                }
                export_csv(&view, Path::new(rest))?;
                format!("wrote {} rows to {rest}", view.len())
            }
            other => bail!("unknown command '{other}', try 'help'"),
        };
        writeln!(output, "{}", text.trim_end())?;
        Ok(())
    }

    fn print_status<W: Write>(&self, output: &mut W) -> Result<()> {
        match &self.state.status_message {
            Some(msg) => writeln!(output, "warning: {msg}")?,
            None => writeln!(output, "{} rows selected", self.state.visible_indices.len())?,
        }
        Ok(())
    }

    fn print_selection<W: Write>(&self, output: &mut W) -> Result<()> {
        let sel = &self.state.selection;
        let years: Vec<String> = sel.years.iter().map(i32::to_string).collect();
        let regions: Vec<&str> = sel.regions.iter().map(String::as_str).collect();
        writeln!(output, "years:   {}", years.join(", "))?;
        writeln!(output, "regions: {}", regions.join(", "))?;
        match &sel.factors {
            None => writeln!(output, "factors: all")?,
            Some(f) => {
                let f: Vec<&str> = f.iter().map(String::as_str).collect();
                writeln!(output, "factors: {}", f.join(", "))?
            }
        }
        self.print_status(output)
    }
}

fn parse_dimension(s: &str) -> Result<Dimension> {
    match s {
        "year" => Ok(Dimension::Year),
        "region" => Ok(Dimension::Region),
        other => bail!("expected 'year' or 'region', got '{other}'"),
    }
}

fn parse_k(s: &str) -> Result<Option<usize>> {
    if s.is_empty() {
        return Ok(None);
    }
    s.parse()
        .map(Some)
        .map_err(|_| anyhow!("'{s}' is not a count"))
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::data::loader::LoadOptions;
    use crate::data::testing::SAMPLE_CSV;
    use crate::state::DatasetCache;

    fn shell(dir: &tempfile::TempDir) -> Shell {
        let path = dir.path().join("data.csv");
        std::fs::write(&path, SAMPLE_CSV).unwrap();
        let mut state = DashboardState::new(DatasetCache::new(path, LoadOptions::default()));
        state.load().unwrap();
        Shell::new(state, ReportSettings::default(), OutputFormat::Text)
    }

    fn run(shell: &mut Shell, script: &str) -> String {
        let mut out = Vec::new();
        shell.run(Cursor::new(script), &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_toggle_and_summary() {
        let dir = tempfile::tempdir().unwrap();
        let mut sh = shell(&dir);
        let out = run(&mut sh, "year 2022\nregion Kab. Jember\nsummary\nquit\nsummary\n");

        assert!(out.contains("3 rows selected"), "{out}");
        assert!(out.contains("2 rows selected"), "{out}");
        assert!(out.contains("Dominant factor:"));
        // nothing after quit
        assert_eq!(out.matches("Dominant factor:").count(), 1);
    }

    #[test]
    fn test_empty_selection_is_reported_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut sh = shell(&dir);
        let out = run(&mut sh, "none regions\nsummary\nall regions\nratio\n");

        assert!(out.contains("warning: no rows match the current selection"), "{out}");
        assert!(out.contains("error: no rows match the current selection"), "{out}");
        assert!(out.contains("Divorce ratio: 5.46%"), "{out}");
    }

    #[test]
    fn test_bad_input_keeps_session() {
        let dir = tempfile::tempdir().unwrap();
        let mut sh = shell(&dir);
        let out = run(&mut sh, "year abc\nfactor Astrologi\nfrobnicate\nfactors 2\n");

        assert!(out.contains("error: 'abc' is not a year"));
        assert!(out.contains("error: unknown factor 'Astrologi'"));
        assert!(out.contains("error: unknown command 'frobnicate'"));
        assert!(out.contains("Other"));
    }

    #[test]
    fn test_group_and_json() {
        let dir = tempfile::tempdir().unwrap();
        let mut sh = shell(&dir);
        let out = run(&mut sh, "format json\ngroup region marriages\n");
        assert!(out.contains("\"Kota Malang\""), "{out}");
        assert!(out.contains("2100"), "{out}");

        let out = run(&mut sh, "group year Total Kasus mean\n");
        assert!(out.contains("76"), "{out}");
    }

    #[test]
    fn test_scatter_and_export() {
        let dir = tempfile::tempdir().unwrap();
        let mut sh = shell(&dir);
        let target = dir.path().join("subset.csv");
        let script = format!(
            "scatter Ekonomi , KDRT\nregion Kota Malang\nexport {}\n",
            target.display()
        );
        let out = run(&mut sh, &script);
        assert!(out.contains("Kota Blitar"), "{out}");
        assert!(out.contains("wrote 3 rows"), "{out}");
        assert_eq!(std::fs::read_to_string(&target).unwrap().lines().count(), 4);
    }

    #[test]
    fn test_reload() {
        let dir = tempfile::tempdir().unwrap();
        let mut sh = shell(&dir);
        let out = run(&mut sh, "year 2022\nreload\nselection\n");
        assert!(out.contains("reloaded"));
        assert!(out.contains("years:   2022, 2023"), "{out}");
        assert_eq!(sh.state.cache.load_count(), 2);
    }
}
