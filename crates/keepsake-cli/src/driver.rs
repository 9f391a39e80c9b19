//! The JSON-lines loop: utterance features in, directives out.

use std::future::Future;

use keepsake_core::{
  directive::Directive,
  features::UtteranceFeatures,
  interview::{Generator, Interview},
};
use tokio::io::{AsyncBufRead, AsyncBufReadExt as _, AsyncWrite, AsyncWriteExt as _};
use tracing::warn;

/// Renders each directive as its own JSON. Real wording is produced by an
/// external generator reading this stream.
pub struct JsonGenerator;

impl Generator for JsonGenerator {
  type Error = keepsake_core::Error;

  fn render<'a>(
    &'a self,
    directive: &'a Directive,
  ) -> impl Future<Output = Result<String, Self::Error>> + Send + 'a {
    async move { directive.to_json() }
  }
}

/// Drive `interview` until the input ends or the session concludes. Returns
/// the number of directives written.
pub async fn run<R, W>(
  interview: &mut Interview,
  input: R,
  mut output: W,
) -> anyhow::Result<usize>
where
  R: AsyncBufRead + Unpin,
  W: AsyncWrite + Unpin,
{
  let generator = JsonGenerator;
  let mut written = 0;

  if let Some(turn) = interview.open(&generator).await? {
    write_line(&mut output, &turn.text).await?;
    written += 1;
  }

  let mut lines = input.lines();
  while !interview.is_concluded() {
    let Some(line) = lines.next_line().await? else {
      break;
    };
    let line = line.trim();
    if line.is_empty() {
      continue;
    }

    let features = serde_json::from_str::<UtteranceFeatures>(line).unwrap_or_else(|e| {
      warn!(error = %e, "malformed utterance features, treating as no signal");
      UtteranceFeatures::empty()
    });

    if let Some(turn) = interview.respond(&features, &generator).await? {
      write_line(&mut output, &turn.text).await?;
      written += 1;
    }
  }

  Ok(written)
}

async fn write_line<W: AsyncWrite + Unpin>(output: &mut W, text: &str) -> std::io::Result<()> {
  output.write_all(text.as_bytes()).await?;
  output.write_all(b"\n").await?;
  output.flush().await
}

#[cfg(test)]
mod tests {
  use keepsake_core::{
    archive::MemoryArchive,
    config::{InterviewConfig, PlannerSettings},
    directive::DirectiveCategory,
    session::Conclusion,
  };

  use super::*;

  async fn interview() -> Interview {
    let mut config = InterviewConfig::new("Robert Chen", "Sarah Chen");
    config.declared_relationship = Some("daughter".into());
    Interview::start(&config, &PlannerSettings::default(), &MemoryArchive::new())
      .await
      .unwrap()
  }

  fn directives(output: &[u8]) -> Vec<Directive> {
    std::str::from_utf8(output)
      .unwrap()
      .lines()
      .map(|l| serde_json::from_str(l).unwrap())
      .collect()
  }

  #[tokio::test]
  async fn one_directive_per_utterance_until_stop() {
    let mut interview = interview().await;
    let input = concat!(
      "{\"candidate_theme_labels\": [\"the restaurant\"]}\n",
      "\n",
      "{\"explicit_request\": {\"request\": \"stop\"}}\n",
      "{}\n",
    );
    let mut output = Vec::new();
    let written = run(&mut interview, input.as_bytes(), &mut output).await.unwrap();

    let ds = directives(&output);
    assert_eq!(written, 3);
    assert_eq!(ds[0].category, DirectiveCategory::ScriptedProbe);
    assert_eq!(ds[1].category, DirectiveCategory::OpenThread);
    assert_eq!(ds[2].category, DirectiveCategory::ClosingSummary);
    assert_eq!(interview.planner().conclusion(), Some(Conclusion::IntervieweeRequested));
  }

  #[tokio::test]
  async fn malformed_line_counts_as_empty_utterance() {
    let mut interview = interview().await;
    let mut output = Vec::new();
    run(&mut interview, "not json\n".as_bytes(), &mut output).await.unwrap();

    assert_eq!(directives(&output).len(), 2);
    assert_eq!(interview.planner().state().turn_index, 1);
  }
}
