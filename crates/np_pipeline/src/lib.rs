//! Staged streaming pipeline over the news collaborators.
//!
//! One run walks five phases — fetch, per-article enrichment, comparative
//! analysis + final synthesis, audio narration — and emits an [`Event`] as
//! each stage lands. Enrichment fans out per article behind a semaphore and
//! rejoins before anything downstream starts; the two analysis calls run
//! concurrently but their events keep a fixed order.

use futures::future::join_all;
use futures::stream::{self, Stream};
use np_core::{
    Analysis, Article, ComparativeReport, Error, InferenceModel, NewsSource, Result,
    SentimentDistribution, SentimentScorer, SpeechRenderer,
};
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, error, info};

pub mod events;

pub use events::Event;
use events::{NO_ARTICLES, PHASE_ANALYSIS, PHASE_AUDIO, PHASE_FETCHING, PHASE_PROCESSING};

const DEFAULT_MAX_CONCURRENCY: usize = 10;
const EVENT_BUFFER: usize = 16;

// Terminal error payloads stay generic; the full error chain goes to the
// log, never to the caller.
const FETCH_FAILED: &str = "Failed to fetch news articles.";
const ENRICH_FAILED: &str = "Failed to analyze articles.";
const ANALYSIS_FAILED: &str = "Failed to run comparative analysis.";
const AUDIO_FAILED: &str = "Failed to generate audio.";

#[derive(Clone)]
pub struct Pipeline {
    source: Arc<dyn NewsSource>,
    model: Arc<dyn InferenceModel>,
    scorer: Arc<dyn SentimentScorer>,
    speech: Arc<dyn SpeechRenderer>,
    max_concurrency: usize,
    audio_filename: Option<String>,
}

impl Pipeline {
    pub fn new(
        source: Arc<dyn NewsSource>,
        model: Arc<dyn InferenceModel>,
        scorer: Arc<dyn SentimentScorer>,
        speech: Arc<dyn SpeechRenderer>,
    ) -> Self {
        Self {
            source,
            model,
            scorer,
            speech,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            audio_filename: None,
        }
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    /// Fix the audio filename instead of deriving a timestamped one per run.
    pub fn with_audio_filename(mut self, filename: impl Into<String>) -> Self {
        self.audio_filename = Some(filename.into());
        self
    }

    /// Start one run and hand back its lazy, finite event stream.
    ///
    /// Dropping the stream closes the channel; the driver notices at its
    /// next emission and abandons the rest of the run.
    pub fn run(&self, company: impl Into<String>) -> impl Stream<Item = Event> + Send + 'static {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let pipeline = self.clone();
        let company = company.into();
        tokio::spawn(async move { pipeline.drive(company, tx).await });
        stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|event| (event, rx))
        })
    }

    async fn drive(self, company: String, tx: mpsc::Sender<Event>) {
        if !emit(&tx, Event::Status(PHASE_FETCHING)).await {
            return;
        }
        let articles = match self.source.fetch_articles(&company).await {
            Ok(articles) => articles,
            Err(e) => {
                error!(company = %company, error = %e, "News fetch failed");
                emit(&tx, Event::Error(FETCH_FAILED.to_string())).await;
                return;
            }
        };
        if articles.is_empty() {
            info!(company = %company, "No valid articles found");
            emit(&tx, Event::Error(NO_ARTICLES.to_string())).await;
            return;
        }
        info!(company = %company, count = articles.len(), "📰 Fetched articles");

        if !emit(&tx, Event::Status(PHASE_PROCESSING)).await {
            return;
        }
        let articles = match self.enrich_all(articles).await {
            Ok(articles) => articles,
            Err(e) => {
                error!(company = %company, error = %e, "Enrichment failed");
                emit(&tx, Event::Error(ENRICH_FAILED.to_string())).await;
                return;
            }
        };
        if !emit(&tx, Event::Articles(articles.clone())).await {
            return;
        }

        if !emit(&tx, Event::Status(PHASE_ANALYSIS)).await {
            return;
        }
        // Independent of each other, so they run concurrently; emission
        // order below stays fixed regardless of which finishes first.
        let (coverage, final_summary) = tokio::join!(
            self.model.compare_coverage(&articles),
            self.model.final_assessment(&articles)
        );
        let (coverage, final_summary) = match (coverage, final_summary) {
            (Ok(coverage), Ok(final_summary)) => (coverage, final_summary),
            (Err(e), _) | (_, Err(e)) => {
                error!(company = %company, error = %e, "Analysis failed");
                emit(&tx, Event::Error(ANALYSIS_FAILED.to_string())).await;
                return;
            }
        };
        let report = ComparativeReport {
            sentiment_distribution: distribution(&articles),
            coverage_differences: coverage.coverage_differences,
            topic_overlap: coverage.topic_overlap,
        };
        if !emit(&tx, Event::ComparativeScore(report)).await {
            return;
        }
        if !emit(&tx, Event::FinalAnalysis(final_summary.clone())).await {
            return;
        }

        if !emit(&tx, Event::Status(PHASE_AUDIO)).await {
            return;
        }
        let filename = self.audio_filename();
        match self.speech.render(&final_summary, &filename).await {
            Ok(reference) => {
                info!(company = %company, reference = %reference, "✅ Run complete");
                emit(&tx, Event::Audio(reference)).await;
            }
            Err(e) => {
                error!(company = %company, error = %e, "Audio rendering failed");
                emit(&tx, Event::Error(AUDIO_FAILED.to_string())).await;
            }
        }
    }

    /// Fan out enrichment per article and wait for every one to settle.
    ///
    /// `join_all` is the barrier and keeps fetch order; the first failure
    /// aborts the run only after all tasks have resolved, so no
    /// half-enriched article ever escapes.
    async fn enrich_all(&self, articles: Vec<Article>) -> Result<Vec<Article>> {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let tasks: Vec<_> = articles
            .into_iter()
            .map(|article| {
                let model = self.model.clone();
                let scorer = self.scorer.clone();
                let semaphore = semaphore.clone();
                async move {
                    let _permit = semaphore
                        .acquire()
                        .await
                        .map_err(|e| Error::External(e.into()))?;
                    enrich(model.as_ref(), scorer.as_ref(), article).await
                }
            })
            .collect();

        join_all(tasks).await.into_iter().collect()
    }

    fn audio_filename(&self) -> String {
        self.audio_filename.clone().unwrap_or_else(|| {
            format!("analysis-{}.mp3", chrono::Utc::now().format("%Y%m%d%H%M%S%3f"))
        })
    }
}

/// Within one article the summary feeds the sentiment text, so the two
/// calls are sequential here; across articles everything overlaps.
async fn enrich(
    model: &dyn InferenceModel,
    scorer: &dyn SentimentScorer,
    mut article: Article,
) -> Result<Article> {
    let digest = model.summarize(&article.content).await?;
    let sentiment = scorer
        .score(&format!("{}: {}", article.title, digest.summary))
        .await?;
    debug!(url = %article.url, %sentiment, "Enriched article");
    article.analysis = Some(Analysis {
        topics: digest.topics,
        summary: digest.summary,
        sentiment,
    });
    Ok(article)
}

fn distribution(articles: &[Article]) -> SentimentDistribution {
    let mut distribution = SentimentDistribution::default();
    for article in articles {
        if let Some(analysis) = &article.analysis {
            distribution.record(analysis.sentiment);
        }
    }
    distribution
}

async fn emit(tx: &mpsc::Sender<Event>, event: Event) -> bool {
    if tx.send(event).await.is_err() {
        debug!("Consumer disconnected, abandoning run");
        return false;
    }
    true
}

pub mod prelude {
    pub use super::events::Event;
    pub use super::Pipeline;
    pub use np_core::{Article, ComparativeReport, Result};
}

#[cfg(test)]
mod tests {
    use super::events::{NO_ARTICLES, PHASE_ANALYSIS, PHASE_AUDIO, PHASE_FETCHING, PHASE_PROCESSING};
    use super::*;
    use async_trait::async_trait;
    use futures::StreamExt;
    use np_core::{ArticleDigest, CoverageDifference, CoverageReport, Sentiment};
    use std::time::Duration;
    use tokio::time::sleep;

    struct StaticSource(Vec<Article>);

    #[async_trait]
    impl NewsSource for StaticSource {
        async fn fetch_articles(&self, _query: &str) -> Result<Vec<Article>> {
            Ok(self.0.clone())
        }
    }

    struct FailingSource;

    #[async_trait]
    impl NewsSource for FailingSource {
        async fn fetch_articles(&self, _query: &str) -> Result<Vec<Article>> {
            Err(Error::Scraping("connection reset by peer".to_string()))
        }
    }

    /// Summaries echo the content; `delay=N` markers stagger completion,
    /// `poison` markers fail the summarize call.
    #[derive(Default)]
    struct MockModel {
        compare_delay_ms: u64,
    }

    #[async_trait]
    impl InferenceModel for MockModel {
        async fn summarize(&self, content: &str) -> Result<ArticleDigest> {
            if content.contains("poison") {
                return Err(Error::MalformedGeneration(
                    "expected JSON payload: EOF while parsing".to_string(),
                ));
            }
            if let Some(ms) = content
                .split("delay=")
                .nth(1)
                .and_then(|rest| rest.split_whitespace().next())
                .and_then(|n| n.parse::<u64>().ok())
            {
                sleep(Duration::from_millis(ms)).await;
            }
            Ok(ArticleDigest {
                summary: format!("summary of {}", content),
                topics: vec!["markets".to_string()],
            })
        }

        async fn compare_coverage(&self, _articles: &[Article]) -> Result<CoverageReport> {
            if self.compare_delay_ms > 0 {
                sleep(Duration::from_millis(self.compare_delay_ms)).await;
            }
            Ok(CoverageReport {
                coverage_differences: vec![CoverageDifference {
                    comparison: "Article 1 is upbeat, Article 2 is not.".to_string(),
                    impact: "Mixed signals for investors.".to_string(),
                }],
                topic_overlap: vec!["markets".to_string()],
            })
        }

        async fn final_assessment(&self, _articles: &[Article]) -> Result<String> {
            Ok("Coverage is mostly positive.".to_string())
        }
    }

    /// Positive if the scored text mentions "plus", negative on "minus".
    struct KeywordScorer;

    #[async_trait]
    impl SentimentScorer for KeywordScorer {
        async fn score(&self, text: &str) -> Result<Sentiment> {
            Ok(if text.contains("plus") {
                Sentiment::Positive
            } else if text.contains("minus") {
                Sentiment::Negative
            } else {
                Sentiment::Neutral
            })
        }
    }

    struct MockSpeech {
        fail: bool,
    }

    #[async_trait]
    impl SpeechRenderer for MockSpeech {
        async fn render(&self, _text: &str, filename: &str) -> Result<String> {
            if self.fail {
                return Err(Error::Speech("synthesis returned status 429".to_string()));
            }
            Ok(format!("/static/{}", filename))
        }
    }

    fn article(title: &str, url: &str, content: &str) -> Article {
        Article::new(title, url, content)
    }

    fn pipeline_with(source: Arc<dyn NewsSource>, model: MockModel, speech: MockSpeech) -> Pipeline {
        Pipeline::new(
            source,
            Arc::new(model),
            Arc::new(KeywordScorer),
            Arc::new(speech),
        )
        .with_audio_filename("out.mp3")
    }

    async fn collect(pipeline: &Pipeline, company: &str) -> Vec<Event> {
        pipeline.run(company).collect().await
    }

    fn kind(event: &Event) -> &'static str {
        match event {
            Event::Status(_) => "status",
            Event::Articles(_) => "articles",
            Event::ComparativeScore(_) => "comparative",
            Event::FinalAnalysis(_) => "final",
            Event::Audio(_) => "audio",
            Event::Error(_) => "error",
        }
    }

    #[tokio::test]
    async fn happy_path_emits_every_event_in_fixed_order() {
        let source = Arc::new(StaticSource(vec![
            article("Acme plus growth", "http://a", "good quarter"),
            article("Acme minus lawsuit", "http://b", "bad quarter"),
        ]));
        let pipeline = pipeline_with(source, MockModel::default(), MockSpeech { fail: false });

        let events = collect(&pipeline, "Acme").await;
        assert_eq!(
            events.iter().map(kind).collect::<Vec<_>>(),
            vec![
                "status",
                "status",
                "articles",
                "status",
                "comparative",
                "final",
                "status",
                "audio"
            ]
        );

        let Event::Status(phase) = &events[0] else { panic!() };
        assert_eq!(*phase, PHASE_FETCHING);
        let Event::Status(phase) = &events[1] else { panic!() };
        assert_eq!(*phase, PHASE_PROCESSING);
        let Event::Status(phase) = &events[3] else { panic!() };
        assert_eq!(*phase, PHASE_ANALYSIS);
        let Event::Status(phase) = &events[6] else { panic!() };
        assert_eq!(*phase, PHASE_AUDIO);

        let Event::Articles(articles) = &events[2] else { panic!() };
        assert_eq!(articles.len(), 2);
        for article in articles {
            let analysis = article.analysis.as_ref().expect("article fully enriched");
            assert!(!analysis.summary.is_empty());
            assert!(!analysis.topics.is_empty());
        }
        assert_eq!(articles[0].analysis.as_ref().unwrap().sentiment, Sentiment::Positive);
        assert_eq!(articles[1].analysis.as_ref().unwrap().sentiment, Sentiment::Negative);

        let Event::ComparativeScore(report) = &events[4] else { panic!() };
        assert_eq!(report.sentiment_distribution.total(), 2);
        assert_eq!(report.sentiment_distribution.positive, 1);
        assert_eq!(report.sentiment_distribution.negative, 1);

        let Event::Audio(reference) = &events[7] else { panic!() };
        assert_eq!(reference, "/static/out.mp3");
    }

    #[tokio::test]
    async fn empty_source_is_exactly_status_then_error() {
        let pipeline = pipeline_with(
            Arc::new(StaticSource(Vec::new())),
            MockModel::default(),
            MockSpeech { fail: false },
        );

        let events = collect(&pipeline, "Acme").await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].to_json_line(), r#"{"status":"fetching_news"}"#);
        let Event::Error(message) = &events[1] else { panic!() };
        assert_eq!(message, NO_ARTICLES);
    }

    #[tokio::test]
    async fn fetch_failure_is_sanitized() {
        let pipeline = pipeline_with(
            Arc::new(FailingSource),
            MockModel::default(),
            MockSpeech { fail: false },
        );

        let events = collect(&pipeline, "Acme").await;
        assert_eq!(events.len(), 2);
        let Event::Error(message) = &events[1] else { panic!() };
        assert!(!message.contains("connection reset"));
    }

    #[tokio::test]
    async fn articles_keep_fetch_order_despite_staggered_completion() {
        // The first article finishes last; order must still hold.
        let source = Arc::new(StaticSource(vec![
            article("One", "http://1", "first delay=80"),
            article("Two", "http://2", "second delay=40"),
            article("Three", "http://3", "third delay=1"),
        ]));
        let pipeline = pipeline_with(source, MockModel::default(), MockSpeech { fail: false });

        let events = collect(&pipeline, "Acme").await;
        let Some(Event::Articles(articles)) = events.iter().find(|e| matches!(e, Event::Articles(_)))
        else {
            panic!("no articles event");
        };
        let urls: Vec<_> = articles.iter().map(|a| a.url.as_str()).collect();
        assert_eq!(urls, vec!["http://1", "http://2", "http://3"]);
    }

    #[tokio::test]
    async fn one_malformed_generation_aborts_before_articles() {
        let source = Arc::new(StaticSource(vec![
            article("Fine", "http://1", "clean content"),
            article("Broken", "http://2", "poison content"),
            article("Also fine", "http://3", "clean content"),
        ]));
        let pipeline = pipeline_with(source, MockModel::default(), MockSpeech { fail: false });

        let events = collect(&pipeline, "Acme").await;
        assert_eq!(
            events.iter().map(kind).collect::<Vec<_>>(),
            vec!["status", "status", "error"]
        );
        let Event::Error(message) = events.last().unwrap() else { panic!() };
        assert_eq!(message, ENRICH_FAILED);
        assert!(!message.contains("EOF"));
    }

    #[tokio::test]
    async fn comparative_precedes_final_even_when_it_finishes_last() {
        let source = Arc::new(StaticSource(vec![article("A", "http://a", "content")]));
        let pipeline = pipeline_with(
            source,
            MockModel { compare_delay_ms: 60 },
            MockSpeech { fail: false },
        );

        let events = collect(&pipeline, "Acme").await;
        let kinds: Vec<_> = events.iter().map(kind).collect();
        let comparative = kinds.iter().position(|k| *k == "comparative").unwrap();
        let final_pos = kinds.iter().position(|k| *k == "final").unwrap();
        assert!(comparative < final_pos);
    }

    #[tokio::test]
    async fn narration_failure_ends_the_stream_with_an_error() {
        let source = Arc::new(StaticSource(vec![article("A", "http://a", "content")]));
        let pipeline = pipeline_with(source, MockModel::default(), MockSpeech { fail: true });

        let events = collect(&pipeline, "Acme").await;
        let kinds: Vec<_> = events.iter().map(kind).collect();
        assert_eq!(
            kinds,
            vec!["status", "status", "articles", "status", "comparative", "final", "status", "error"]
        );
        assert!(events.last().unwrap().is_terminal_error());
    }

    #[tokio::test]
    async fn identical_inputs_produce_identical_event_streams() {
        let source = Arc::new(StaticSource(vec![
            article("Acme plus", "http://a", "alpha"),
            article("Acme minus", "http://b", "beta"),
        ]));
        let pipeline = pipeline_with(source, MockModel::default(), MockSpeech { fail: false });

        let first: Vec<String> = collect(&pipeline, "Acme")
            .await
            .iter()
            .map(Event::to_json_line)
            .collect();
        let second: Vec<String> = collect(&pipeline, "Acme")
            .await
            .iter()
            .map(Event::to_json_line)
            .collect();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn distribution_counts_sum_to_article_count() {
        let source = Arc::new(StaticSource(vec![
            article("plus one", "http://1", "a"),
            article("plus two", "http://2", "b"),
            article("minus one", "http://3", "c"),
            article("quiet one", "http://4", "d"),
        ]));
        let pipeline = pipeline_with(source, MockModel::default(), MockSpeech { fail: false });

        let events = collect(&pipeline, "Acme").await;
        let Some(Event::ComparativeScore(report)) =
            events.iter().find(|e| matches!(e, Event::ComparativeScore(_)))
        else {
            panic!("no comparative event");
        };
        assert_eq!(report.sentiment_distribution.total(), 4);
        assert_eq!(report.sentiment_distribution.positive, 2);
        assert_eq!(report.sentiment_distribution.negative, 1);
        assert_eq!(report.sentiment_distribution.neutral, 1);
    }

    #[tokio::test]
    async fn enrichment_respects_the_concurrency_cap() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        struct CountingModel {
            active: AtomicUsize,
            peak: AtomicUsize,
        }

        #[async_trait]
        impl InferenceModel for CountingModel {
            async fn summarize(&self, _content: &str) -> Result<ArticleDigest> {
                let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
                self.peak.fetch_max(active, Ordering::SeqCst);
                sleep(Duration::from_millis(20)).await;
                self.active.fetch_sub(1, Ordering::SeqCst);
                Ok(ArticleDigest {
                    summary: "s".to_string(),
                    topics: vec!["t".to_string()],
                })
            }

            async fn compare_coverage(&self, _articles: &[Article]) -> Result<CoverageReport> {
                Ok(CoverageReport {
                    coverage_differences: Vec::new(),
                    topic_overlap: Vec::new(),
                })
            }

            async fn final_assessment(&self, _articles: &[Article]) -> Result<String> {
                Ok("done".to_string())
            }
        }

        let articles: Vec<_> = (0..8)
            .map(|i| article(&format!("A{}", i), &format!("http://{}", i), "c"))
            .collect();
        let model = Arc::new(CountingModel {
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let pipeline = Pipeline::new(
            Arc::new(StaticSource(articles)),
            model.clone(),
            Arc::new(KeywordScorer),
            Arc::new(MockSpeech { fail: false }),
        )
        .with_max_concurrency(2)
        .with_audio_filename("out.mp3");

        let _ = collect(&pipeline, "Acme").await;
        assert!(model.peak.load(Ordering::SeqCst) <= 2);
    }
}
