//! In-memory fakes shared by the behaviour tests.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use nextmeeting_core::backend::{SourceBackendId, StorageBackendId};
use nextmeeting_core::data_source::{MeetingSource, SourceError, SourceFuture};
use nextmeeting_core::effects::{AdvisoryEffect, AdvisoryError, EffectFuture};
use nextmeeting_core::http_client::{HttpClient, HttpError, HttpFuture, HttpRequest, HttpResponse};
use nextmeeting_core::storage::{
    ObjectBody, ObjectLocation, StorageAdapter, StorageError, StorageFuture, UploadReceipt,
    UploadRequest,
};
use nextmeeting_core::{CrashReport, RawRecord};

pub const TEMPLATE: &str = "<html><script>/* INJECT_SCHEDULE_JSON */</script></html>";

pub fn record(day: &str, time: &str, name: Option<&str>) -> RawRecord {
    RawRecord {
        day_of_week: Some(day.to_owned()),
        start_time: Some(time.to_owned()),
        meeting_name: name.map(str::to_owned),
        ..RawRecord::default()
    }
}

/// Source answering per identifier, counting calls.
#[derive(Default)]
pub struct StaticSource {
    records: Mutex<HashMap<String, Result<Vec<RawRecord>, SourceError>>>,
    calls: Mutex<Vec<String>>,
}

impl StaticSource {
    pub fn with(self, identifier: &str, records: Vec<RawRecord>) -> Self {
        self.records
            .lock()
            .expect("records lock")
            .insert(identifier.to_owned(), Ok(records));
        self
    }

    pub fn failing(self, identifier: &str, error: SourceError) -> Self {
        self.records
            .lock()
            .expect("records lock")
            .insert(identifier.to_owned(), Err(error));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }
}

impl MeetingSource for StaticSource {
    fn id(&self) -> SourceBackendId {
        SourceBackendId::JsonFile
    }

    fn fetch_meetings<'a>(
        &'a self,
        source_identifier: &'a str,
    ) -> SourceFuture<'a, Result<Vec<RawRecord>, SourceError>> {
        self.calls
            .lock()
            .expect("calls lock")
            .push(source_identifier.to_owned());
        let answer = self
            .records
            .lock()
            .expect("records lock")
            .get(source_identifier)
            .cloned()
            .unwrap_or_else(|| Ok(Vec::new()));
        Box::pin(async move { answer })
    }
}

/// Wraps a source and sleeps before answering.
pub struct SlowSource<S> {
    pub inner: S,
    pub delay: Duration,
}

impl<S: MeetingSource> MeetingSource for SlowSource<S> {
    fn id(&self) -> SourceBackendId {
        self.inner.id()
    }

    fn fetch_meetings<'a>(
        &'a self,
        source_identifier: &'a str,
    ) -> SourceFuture<'a, Result<Vec<RawRecord>, SourceError>> {
        Box::pin(async move {
            tokio::time::sleep(self.delay).await;
            self.inner.fetch_meetings(source_identifier).await
        })
    }
}

/// Object store in memory. Downloads can be scripted to fail first.
#[derive(Default)]
pub struct InMemoryStorage {
    objects: Mutex<HashMap<ObjectLocation, (ObjectBody, String)>>,
    download_failures: Mutex<VecDeque<StorageError>>,
    download_attempts: AtomicU32,
    upload_failures: Mutex<HashMap<String, StorageError>>,
}

impl InMemoryStorage {
    pub fn with_template(bucket: &str, key: &str, template: &str) -> Self {
        let storage = Self::default();
        storage.objects.lock().expect("objects lock").insert(
            ObjectLocation::new(bucket, key),
            (ObjectBody::from(template), String::from("text/html")),
        );
        storage
    }

    pub fn fail_downloads(self, failures: usize) -> Self {
        {
            let mut queue = self.download_failures.lock().expect("failures lock");
            for attempt in 0..failures {
                queue.push_back(StorageError::unavailable(format!(
                    "simulated outage #{}",
                    attempt + 1
                )));
            }
        }
        self
    }

    pub fn fail_upload_of(self, key: &str) -> Self {
        self.upload_failures
            .lock()
            .expect("upload failures lock")
            .insert(key.to_owned(), StorageError::io("disk full"));
        self
    }

    pub fn download_attempts(&self) -> u32 {
        self.download_attempts.load(Ordering::SeqCst)
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<(String, String)> {
        self.objects
            .lock()
            .expect("objects lock")
            .get(&ObjectLocation::new(bucket, key))
            .map(|(body, content_type)| {
                (
                    String::from_utf8_lossy(body.as_bytes()).into_owned(),
                    content_type.clone(),
                )
            })
    }

    pub fn keys(&self, bucket: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .objects
            .lock()
            .expect("objects lock")
            .keys()
            .filter(|location| location.bucket == bucket)
            .map(|location| location.key.clone())
            .collect();
        keys.sort();
        keys
    }
}

impl StorageAdapter for InMemoryStorage {
    fn id(&self) -> StorageBackendId {
        StorageBackendId::Local
    }

    fn upload_file<'a>(
        &'a self,
        request: UploadRequest,
    ) -> StorageFuture<'a, Result<UploadReceipt, StorageError>> {
        Box::pin(async move {
            if let Some(error) = self
                .upload_failures
                .lock()
                .expect("upload failures lock")
                .get(&request.location.key)
                .cloned()
            {
                return Err(error);
            }
            self.objects.lock().expect("objects lock").insert(
                request.location.clone(),
                (request.body, request.content_type),
            );
            Ok(UploadReceipt {
                location: request.location,
                etag: None,
                public_url: None,
            })
        })
    }

    fn download_file<'a>(
        &'a self,
        location: &'a ObjectLocation,
    ) -> StorageFuture<'a, Result<ObjectBody, StorageError>> {
        Box::pin(async move {
            self.download_attempts.fetch_add(1, Ordering::SeqCst);
            if let Some(error) = self
                .download_failures
                .lock()
                .expect("failures lock")
                .pop_front()
            {
                return Err(error);
            }
            self.objects
                .lock()
                .expect("objects lock")
                .get(location)
                .map(|(body, _)| body.clone())
                .ok_or_else(|| StorageError::not_found(&location.bucket, &location.key))
        })
    }

    fn file_exists<'a>(
        &'a self,
        location: &'a ObjectLocation,
    ) -> StorageFuture<'a, Result<bool, StorageError>> {
        Box::pin(async move {
            Ok(self
                .objects
                .lock()
                .expect("objects lock")
                .contains_key(location))
        })
    }
}

/// Records every input; optionally fails each call.
pub struct RecordingEffect<T> {
    seen: Mutex<Vec<T>>,
    fail: bool,
}

impl<T> RecordingEffect<T> {
    pub fn succeeding() -> Arc<Self> {
        Arc::new(Self {
            seen: Mutex::new(Vec::new()),
            fail: false,
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            seen: Mutex::new(Vec::new()),
            fail: true,
        })
    }

    pub fn seen(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.seen.lock().expect("seen lock").clone()
    }

    fn record(&self, value: T) -> Result<(), AdvisoryError> {
        self.seen.lock().expect("seen lock").push(value);
        if self.fail {
            Err(AdvisoryError::Transport(String::from("simulated outage")))
        } else {
            Ok(())
        }
    }
}

impl AdvisoryEffect<str> for RecordingEffect<String> {
    fn name(&self) -> &'static str {
        "recording_notifier"
    }

    fn apply<'a>(&'a self, input: &'a str) -> EffectFuture<'a> {
        let result = self.record(input.to_owned());
        Box::pin(async move { result })
    }
}

impl AdvisoryEffect<CrashReport> for RecordingEffect<CrashReport> {
    fn name(&self) -> &'static str {
        "recording_crash_reporter"
    }

    fn apply<'a>(&'a self, input: &'a CrashReport) -> EffectFuture<'a> {
        let result = self.record(input.clone());
        Box::pin(async move { result })
    }
}

impl AdvisoryEffect<[String]> for RecordingEffect<Vec<String>> {
    fn name(&self) -> &'static str {
        "recording_cdn"
    }

    fn apply<'a>(&'a self, input: &'a [String]) -> EffectFuture<'a> {
        let result = self.record(input.to_vec());
        Box::pin(async move { result })
    }
}

impl AdvisoryEffect<()> for RecordingEffect<()> {
    fn name(&self) -> &'static str {
        "recording_check_in"
    }

    fn apply<'a>(&'a self, _input: &'a ()) -> EffectFuture<'a> {
        let result = self.record(());
        Box::pin(async move { result })
    }
}

/// Replays scripted responses in order and records every request.
/// An exhausted script answers with a permanent transport error.
#[derive(Default)]
pub struct ScriptedHttpClient {
    responses: Mutex<VecDeque<Result<HttpResponse, HttpError>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedHttpClient {
    /// No responses scripted; any request fails.
    pub fn silent() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn json(bodies: impl IntoIterator<Item = serde_json::Value>) -> Arc<Self> {
        Self::replying(
            bodies
                .into_iter()
                .map(|body| Ok(HttpResponse::ok_json(body.to_string()))),
        )
    }

    pub fn replying(
        responses: impl IntoIterator<Item = Result<HttpResponse, HttpError>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().expect("requests lock").clone()
    }

    pub fn urls(&self) -> Vec<String> {
        self.requests().into_iter().map(|request| request.url).collect()
    }
}

impl HttpClient for ScriptedHttpClient {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> HttpFuture<'a> {
        self.requests.lock().expect("requests lock").push(request);
        let response = self
            .responses
            .lock()
            .expect("responses lock")
            .pop_front()
            .unwrap_or_else(|| Err(HttpError::permanent("no scripted response left")));
        Box::pin(async move { response })
    }
}
