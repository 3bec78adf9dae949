//! Crawling the RPKI.
//!
//! Starting from the trust anchors, the crawler walks down the tree of CA
//! certificates. Each CA’s repository is fetched once and everything that
//! lives in a repository waits until its fetch has finished or timed out.
//! In the latter case, the objects validated in an earlier run are used.
//!
//! All state of a run is kept in a [`ValidationContext`] owned by the
//! crawler. Fetching happens in a separate task the crawler talks to
//! through channels.

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Arc;
use log::{debug, error, info, warn};
use tokio::sync::mpsc;
use tokio::time::{timeout, timeout_at, Instant};
use crate::config::Config;
use crate::error::{Fatal, ObjectError};
use crate::repository::aspa::Aspa;
use crate::repository::cert::{Cert, CertPurpose};
use crate::repository::crl::Crl;
use crate::repository::object::{Object, ObjectType};
use crate::repository::resources::Afi;
use crate::repository::roa::Roa;
use crate::repository::tal::{Tal, TalUri};
use crate::repository::x509::Time;
use crate::uri::{Https, RsyncModule};
use super::auth::AuthTree;
use super::covering::{ee_covers_as, ee_covers_ip, validate_cert, validate_ta};
use super::crls::CrlTracker;
use super::fetch::{self, FetchRequest, FetchResponse, FetchSource, Fetcher};
use super::mft::{process_manifest, ManifestChild};
use super::output::Output;
use super::provider::Provider;
use super::repo::{Cache, RepoKey, RepoState, RepoTable};
use super::stats::Stats;


//------------ ValidationContext ---------------------------------------------

/// All state accumulated during a validation run.
#[derive(Clone, Debug)]
pub struct ValidationContext {
    /// The validated CA certificates.
    pub auth: AuthTree,

    /// The CRLs of the validated CAs.
    pub crls: CrlTracker,

    /// The validated payload.
    pub output: Output,

    pub stats: Stats,

    /// The time all validity checks are made against.
    pub now: Time,
}

impl ValidationContext {
    pub fn new(now: Time) -> Self {
        ValidationContext {
            auth: AuthTree::new(),
            crls: CrlTracker::new(),
            output: Output::new(),
            stats: Stats::new(),
            now,
        }
    }
}


//------------ Outcome -------------------------------------------------------

/// The result of a complete run.
#[derive(Clone, Debug)]
pub struct Outcome {
    pub output: Output,
    pub stats: Stats,
}


//------------ run -----------------------------------------------------------

/// Runs a complete validation.
///
/// Starts with the certificates of the given trust anchors and walks the
/// tree until there is nothing left to do. Repositories are fetched
/// through `fetcher`, which is cancelled once the run ends. The run fails
/// only if the channel to the fetch task breaks, the cache can’t be set
/// up, or the watchdog of the config expires.
pub async fn run<P: Provider>(
    config: &Config,
    tals: Vec<Tal>,
    provider: P,
    fetcher: Arc<dyn Fetcher>,
) -> Result<Outcome, Fatal> {
    let cache = Cache::new(config.cache_dir.clone());
    cache.prepare().map_err(Fatal::Cache)?;

    let (req_tx, req_rx) = mpsc::unbounded_channel();
    let (resp_tx, resp_rx) = mpsc::unbounded_channel();
    let fetch_task = tokio::spawn(fetch::serve(fetcher, req_rx, resp_tx));

    let mut crawler = Crawler {
        config,
        provider,
        cache,
        ctx: ValidationContext::new(Time::now()),
        queue: VecDeque::new(),
        repos: RepoTable::new(),
        tals: HashMap::new(),
        requests: req_tx,
        responses: resp_rx,
    };
    let res = timeout(config.watchdog, async {
        for tal in tals {
            crawler.add_tal(tal)?;
        }
        crawler.crawl().await
    }).await;

    // Closing the request channel stops the fetch task and any fetches
    // still running.
    let Crawler { ctx, requests, .. } = crawler;
    drop(requests);
    if let Err(err) = fetch_task.await {
        error!("Fetch task failed: {}", err);
    }
    match res {
        Ok(Ok(())) => { }
        Ok(Err(err)) => {
            error!("Validation aborted: {}", err);
            return Err(err)
        }
        Err(_) => {
            error!("Validation did not finish within {:?}.", config.watchdog);
            return Err(Fatal::Watchdog)
        }
    }

    let ValidationContext { output, mut stats, .. } = ctx;
    stats.set_output(&output);
    info!("Validation finished.\n{}", stats);
    Ok(Outcome { output, stats })
}


//------------ Task ----------------------------------------------------------

/// Something waiting to be processed.
#[derive(Clone, Debug)]
enum Task {
    /// The certificate of a trust anchor.
    Ta { name: Arc<str> },

    /// The manifest of a validated CA.
    Mft { ca: usize },

    /// A file listed on the manifest of a CA.
    File { child: ManifestChild, ca: usize },
}


//------------ TaState -------------------------------------------------------

#[derive(Clone, Debug)]
struct TaState {
    tal: Tal,

    /// The index of the next TAL URI to try.
    next_uri: usize,
}


//------------ Crawler -------------------------------------------------------

struct Crawler<'a, P> {
    config: &'a Config,
    provider: P,
    cache: Cache,
    ctx: ValidationContext,

    /// The tasks ready to be processed.
    queue: VecDeque<Task>,

    /// The repositories and the tasks waiting for them.
    repos: RepoTable<Task>,

    tals: HashMap<Arc<str>, TaState>,
    requests: mpsc::UnboundedSender<FetchRequest>,
    responses: mpsc::UnboundedReceiver<FetchResponse>,
}

/// # Scheduling
///
impl<'a, P: Provider> Crawler<'a, P> {
    /// Processes tasks until no task and no fetch is left.
    async fn crawl(&mut self) -> Result<(), Fatal> {
        loop {
            while let Some(task) = self.queue.pop_front() {
                self.dispatch(task)?;
            }
            let deadline = match self.repos.next_deadline() {
                Some(deadline) => deadline,
                None => return Ok(())
            };
            match timeout_at(deadline, self.responses.recv()).await {
                Ok(Some(response)) => self.handle_response(response)?,
                Ok(None) => return Err(Fatal::BrokenChannel),
                Err(_) => self.expire(),
            }
        }
    }

    fn dispatch(&mut self, task: Task) -> Result<(), Fatal> {
        match task {
            Task::Ta { name } => self.process_ta(&name),
            Task::Mft { ca } => {
                self.process_mft(ca);
                Ok(())
            }
            Task::File { child, ca } => self.process_file(child, ca),
        }
    }

    fn add_tal(&mut self, mut tal: Tal) -> Result<(), Fatal> {
        tal.prefer_https();
        let name: Arc<str> = tal.name().into();
        if self.tals.contains_key(&name) {
            warn!("Duplicate TAL name {}, skipping.", name);
            return Ok(())
        }
        self.tals.insert(name.clone(), TaState { tal, next_uri: 0 });
        let key = RepoKey::Ta(name.to_string());
        self.repos.start(key.clone(), self.deadline());
        if !self.fetch_ta(&name)? {
            self.finish(&key, false);
        }
        self.park(&key, Task::Ta { name });
        Ok(())
    }

    /// Requests the next URI of a TAL.
    ///
    /// Returns `false` if all URIs have been tried.
    fn fetch_ta(&mut self, name: &str) -> Result<bool, Fatal> {
        let state = match self.tals.get_mut(name) {
            Some(state) => state,
            None => return Ok(false)
        };
        let uri = match state.tal.uris().nth(state.next_uri) {
            Some(uri) => uri.clone(),
            None => return Ok(false)
        };
        state.next_uri += 1;
        let source = match uri {
            TalUri::Rsync(uri) => FetchSource::Rsync(uri),
            TalUri::Https(uri) => FetchSource::Https(uri),
        };
        self.send(FetchRequest {
            repo: RepoKey::Ta(name.into()),
            source,
            target: self.cache.ta_path(name),
            session: None,
        })?;
        Ok(true)
    }

    /// Starts fetching a module unless that has happened already.
    fn fetch_module(
        &mut self, module: &RsyncModule, notify: Option<&Https>
    ) -> Result<(), Fatal> {
        let key = RepoKey::Module(module.clone());
        if !self.repos.start(key.clone(), self.deadline()) {
            return Ok(())
        }
        let request = match notify {
            Some(notify) if self.config.prefer_rrdp => {
                FetchRequest {
                    repo: key,
                    source: FetchSource::Rrdp(notify.clone()),
                    target: self.cache.repo_dir(module),
                    session: self.cache.read_session(notify),
                }
            }
            _ => self.rsync_request(module)
        };
        self.send(request)
    }

    fn rsync_request(&self, module: &RsyncModule) -> FetchRequest {
        FetchRequest {
            repo: RepoKey::Module(module.clone()),
            source: FetchSource::Rsync(module.to_uri()),
            target: self.cache.repo_dir(module),
            session: None,
        }
    }

    fn send(&self, request: FetchRequest) -> Result<(), Fatal> {
        self.requests.send(request).map_err(|_| Fatal::BrokenChannel)
    }

    fn deadline(&self) -> Instant {
        Instant::now() + self.config.repo_timeout
    }

    /// Queues a task once its repository is done.
    fn park(&mut self, key: &RepoKey, task: Task) {
        if let Some(task) = self.repos.wait(key, task) {
            self.queue.push_back(task)
        }
    }

    fn handle_response(
        &mut self, response: FetchResponse
    ) -> Result<(), Fatal> {
        if !matches!(
            self.repos.state(&response.repo),
            Some(RepoState::Fetching { .. })
        ) {
            debug!("Ignoring late response for {}.", response.repo);
            return Ok(())
        }
        if response.succeeded {
            if let FetchSource::Rrdp(ref notify) = response.source {
                if let Some(ref session) = response.session {
                    if let Err(err) = self.cache.write_session(
                        notify, session
                    ) {
                        warn!(
                            "Failed to store RRDP state for {}: {}",
                            notify, err
                        );
                    }
                }
            }
            debug!("Fetched {}.", response.repo);
            self.ctx.stats.repo_synced();
            self.finish(&response.repo, true);
            return Ok(())
        }
        match response.repo {
            RepoKey::Module(ref module) if response.source.is_rrdp() => {
                warn!("RRDP fetch for {} failed, trying rsync.", module);
                self.repos.restart(&response.repo, self.deadline());
                let request = self.rsync_request(module);
                self.send(request)
            }
            RepoKey::Ta(ref name) => {
                if self.fetch_ta(name)? {
                    warn!("Fetching {} failed, trying next URI.", response.repo);
                    self.repos.restart(&response.repo, self.deadline());
                }
                else {
                    warn!("Fetching {} failed, using cache.", response.repo);
                    self.fallback(&response.repo);
                }
                Ok(())
            }
            RepoKey::Module(_) => {
                warn!("Fetching {} failed, using cache.", response.repo);
                self.fallback(&response.repo);
                Ok(())
            }
        }
    }

    /// Falls back to the cache for all repositories past their deadline.
    fn expire(&mut self) {
        for key in self.repos.expired(Instant::now()) {
            warn!("Timeout fetching {}, using cache.", key);
            self.fallback(&key);
        }
    }

    fn fallback(&mut self, key: &RepoKey) {
        self.ctx.stats.repo_fallback();
        self.finish(key, false);
    }

    /// Marks a repository as done and queues everything waiting for it.
    fn finish(&mut self, key: &RepoKey, fetched: bool) {
        if let Some(tasks) = self.repos.finish(key, fetched) {
            self.queue.extend(tasks)
        }
    }

    /// Schedules the manifest of a newly validated CA.
    fn enqueue_ca(&mut self, idx: usize) -> Result<(), Fatal> {
        let (module, notify) = match self.ctx.auth.get(idx) {
            Some(auth) => match auth.cert().ca_repository() {
                Some(uri) => {
                    (uri.module().clone(), auth.cert().rpki_notify().cloned())
                }
                None => return Ok(())
            }
            None => return Ok(())
        };
        self.fetch_module(&module, notify.as_ref())?;
        self.park(&RepoKey::Module(module), Task::Mft { ca: idx });
        Ok(())
    }
}

/// # Processing
///
impl<'a, P: Provider> Crawler<'a, P> {
    fn process_ta(&mut self, name: &Arc<str>) -> Result<(), Fatal> {
        let path = self.cache.ta_path(name);
        let res = self.load_ta(name, &path);
        self.ctx.stats.record(ObjectType::Cer, &res);
        match res {
            Ok(idx) => {
                info!("Found valid trust anchor {}.", name);
                self.enqueue_ca(idx)
            }
            Err(err) => {
                warn!("{}: {}", path.display(), err);
                Ok(())
            }
        }
    }

    fn load_ta(
        &mut self, name: &Arc<str>, path: &Path
    ) -> Result<usize, ObjectError> {
        let data = std::fs::read(path).map_err(|err| {
            ObjectError::chain(format!("cannot read certificate: {}", err))
        })?;
        let cert = match self.provider.decode(ObjectType::Cer, &data, None)? {
            Object::Cert(cert) => cert,
            _ => return Err(ObjectError::parse("not a certificate"))
        };
        let tal = match self.tals.get(name) {
            Some(state) => &state.tal,
            None => return Err(ObjectError::chain("unknown TAL"))
        };
        validate_ta(&self.provider, &cert, tal, self.ctx.now)?;
        check_ca_uris(&cert)?;
        Ok(self.ctx.auth.insert(cert, None, name.clone())?)
    }

    fn process_mft(&mut self, ca: usize) {
        let (module, mft_uri) = match self.ctx.auth.get(ca).map(|auth| {
            (auth.cert().ca_repository(), auth.cert().rpki_manifest())
        }) {
            Some((Some(repo), Some(mft))) => {
                (repo.module().clone(), mft.clone())
            }
            _ => return
        };
        let fetched = match self.repos.state(&RepoKey::Module(module)) {
            Some(RepoState::Done { fetched }) => fetched,
            _ => false
        };
        let res = process_manifest(
            &self.provider, &self.cache, &mut self.ctx, ca, fetched
        );
        self.ctx.stats.record(ObjectType::Mft, &res);
        match res {
            Ok(children) => {
                debug!("{}: {} files to process.", mft_uri, children.len());
                self.queue.extend(children.into_iter().map(|child| {
                    Task::File { child, ca }
                }));
            }
            Err(ObjectError::Stale(_)) => { }
            Err(err) => warn!("{}: {}", mft_uri, err),
        }
    }

    fn process_file(
        &mut self, child: ManifestChild, ca: usize
    ) -> Result<(), Fatal> {
        let res = self.process_object(&child, ca);
        self.ctx.stats.record(child.kind, &res);
        match res {
            Ok((fetched, new_ca)) => {
                debug!("{}: valid.", child.uri);
                if fetched {
                    if let Err(err) = self.cache.promote(&child.uri) {
                        warn!(
                            "Failed to store validated {}: {}",
                            child.uri, err
                        );
                    }
                }
                if let Some(idx) = new_ca {
                    self.enqueue_ca(idx)?;
                }
            }
            Err(err) => warn!("{}: {}", child.uri, err),
        }
        Ok(())
    }

    /// Processes a file listed on a manifest.
    ///
    /// Returns whether the file was taken from the fetched tree and the
    /// index of a new CA if the file was a CA certificate.
    fn process_object(
        &mut self, child: &ManifestChild, ca: usize
    ) -> Result<(bool, Option<usize>), ObjectError> {
        let (data, fetched) = self.cache.read(
            &child.uri, child.fetched
        ).ok_or_else(|| ObjectError::chain("file not found"))?;
        let object = self.provider.decode(
            child.kind, &data, Some(child.hash.as_slice())
        )?;
        let new_ca = match object {
            Object::Cert(cert) => self.process_cert(cert, ca)?,
            Object::Roa(roa) => {
                self.process_roa(&roa, ca)?;
                None
            }
            Object::Aspa(aspa) => {
                self.process_aspa(&aspa, ca)?;
                None
            }
            Object::Gbr(gbr) => {
                self.check_ee(gbr.ee(), ca)?;
                None
            }
            Object::Tak(tak) => {
                self.check_ee(tak.ee(), ca)?;
                None
            }
            Object::Rsc(rsc) => {
                self.check_ee(rsc.ee(), ca)?;
                None
            }
            Object::Crl(_) | Object::Mft(_) => {
                return Err(ObjectError::parse("unexpected object type"))
            }
        };
        Ok((fetched, new_ca))
    }

    fn process_cert(
        &mut self, cert: Cert, ca: usize
    ) -> Result<Option<usize>, ObjectError> {
        let ski = cert.subject_key_identifier();
        if self.ctx.auth.find_by_ski(ski).is_some() {
            return Err(ObjectError::chain(format!(
                "duplicate subject key identifier {}", ski
            )))
        }
        let issuer = self.issuer_of(&cert, ca)?;
        let expires = {
            let crl = self.crl_of(issuer)?;
            validate_cert(
                &self.provider, &self.ctx.auth, &cert, issuer, crl,
                self.ctx.now
            )?;
            self.expires(&cert, issuer, crl)
        };
        match cert.purpose() {
            CertPurpose::Ca => {
                check_ca_uris(&cert)?;
                let tal = self.tal_of(issuer)?;
                Ok(Some(self.ctx.auth.insert(cert, Some(issuer), tal)?))
            }
            CertPurpose::Router => {
                self.add_router_keys(&cert, issuer, expires)?;
                Ok(None)
            }
            CertPurpose::Ee => {
                Err(ObjectError::chain("EE certificate published as file"))
            }
        }
    }

    fn add_router_keys(
        &mut self, cert: &Cert, issuer: usize, expires: Time
    ) -> Result<(), ObjectError> {
        if !cert.as_resources().has_concrete() {
            return Err(ObjectError::chain("router certificate without ASNs"))
        }
        if !cert.ip_resources().is_empty() {
            return Err(ObjectError::chain(
                "router certificate with IP resources"
            ))
        }
        let tal = self.tal_of(issuer)?;
        for (min, max) in cert.as_resources().entries().iter().filter_map(
            |entry| entry.bounds()
        ) {
            let mut asn = min;
            loop {
                self.ctx.output.insert_router_key(
                    asn, cert.public_key(), &tal, expires
                );
                if asn >= max {
                    break
                }
                asn = match asn.succ() {
                    Some(asn) => asn,
                    None => break
                };
            }
        }
        Ok(())
    }

    fn process_roa(&mut self, roa: &Roa, ca: usize) -> Result<(), ObjectError> {
        let expires = self.check_ee(roa.ee(), ca)?;
        for prefix in roa.prefixes() {
            ee_covers_ip(
                &self.ctx.auth, roa.ee(), ca,
                prefix.afi(), prefix.prefix().min(), prefix.prefix().max(),
            )?;
        }
        let tal = self.tal_of(ca)?;
        for prefix in roa.prefixes() {
            self.ctx.output.insert_vrp(
                prefix.afi(), prefix.prefix(), prefix.max_len(), roa.asid(),
                &tal, expires,
            );
        }
        Ok(())
    }

    fn process_aspa(
        &mut self, aspa: &Aspa, ca: usize
    ) -> Result<(), ObjectError> {
        let expires = self.check_ee(aspa.ee(), ca)?;
        ee_covers_as(
            &self.ctx.auth, aspa.ee(), ca, aspa.customer(), aspa.customer()
        )?;
        let tal = self.tal_of(ca)?;
        for afi in [Afi::Ipv4, Afi::Ipv6] {
            self.ctx.output.insert_vap(
                afi, aspa.customer(), aspa.providers_for(afi), &tal, expires
            );
        }
        Ok(())
    }

    /// Validates the EE certificate of a signed object.
    ///
    /// Returns the time the payload of the object expires.
    fn check_ee(&self, ee: &Cert, ca: usize) -> Result<Time, ObjectError> {
        if ee.purpose() != CertPurpose::Ee {
            return Err(ObjectError::chain("signed by a non-EE certificate"))
        }
        let issuer = self.issuer_of(ee, ca)?;
        let crl = self.crl_of(issuer)?;
        validate_cert(
            &self.provider, &self.ctx.auth, ee, issuer, crl, self.ctx.now
        )?;
        Ok(self.expires(ee, issuer, crl))
    }

    /// Resolves the issuer of a certificate listed by the CA `ca`.
    fn issuer_of(&self, cert: &Cert, ca: usize) -> Result<usize, ObjectError> {
        let aki = cert.authority_key_identifier().ok_or_else(|| {
            ObjectError::chain("missing authority key identifier")
        })?;
        let issuer = self.ctx.auth.find_by_ski(aki).ok_or_else(|| {
            ObjectError::chain(format!("unknown issuer {}", aki))
        })?;
        if issuer != ca {
            return Err(ObjectError::chain(
                "not issued by the CA of the manifest"
            ))
        }
        Ok(issuer)
    }

    fn crl_of(&self, issuer: usize) -> Result<&Crl, ObjectError> {
        self.ctx.auth.get(issuer).and_then(|auth| {
            self.ctx.crls.get(auth.cert().subject_key_identifier())
        }).ok_or_else(|| ObjectError::chain("no CRL for issuer"))
    }

    fn tal_of(&self, idx: usize) -> Result<Arc<str>, ObjectError> {
        self.ctx.auth.get(idx).map(|auth| auth.tal().clone()).ok_or_else(|| {
            ObjectError::chain("unknown issuer index")
        })
    }

    /// Returns the earliest time anything the payload depends on expires.
    fn expires(&self, cert: &Cert, issuer: usize, crl: &Crl) -> Time {
        let mut res = cert.expires().min(crl.next_update());
        if let Some(auth) = self.ctx.auth.get(issuer) {
            res = res.min(auth.expires())
        }
        res
    }
}

/// Checks that a CA certificate points to its repository and manifest.
fn check_ca_uris(cert: &Cert) -> Result<(), ObjectError> {
    let repository = cert.ca_repository().ok_or_else(|| {
        ObjectError::chain("CA certificate without repository")
    })?;
    let manifest = cert.rpki_manifest().ok_or_else(|| {
        ObjectError::chain("CA certificate without manifest")
    })?;
    if !manifest.is_under(repository) {
        return Err(ObjectError::chain("manifest outside of repository"))
    }
    Ok(())
}


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::Mutex;
    use std::thread;
    use std::time::Duration;
    use crate::repository::resources::Asn;
    use crate::validation::test::{
        aspa, file_and_hash, manifest, roa, tal, tal_with_uris, CertBuilder,
        CrlBuilder, JsonProvider, TestDir,
    };

    /// A fetcher that always fails.
    struct FailingFetcher;

    impl Fetcher for FailingFetcher {
        fn fetch(&self, request: &FetchRequest) -> FetchResponse {
            FetchResponse::failure(request)
        }
    }

    /// A fetcher that takes its time and fails for selected sources.
    ///
    /// It records every source it was asked for.
    struct ScriptedFetcher {
        delay: Duration,
        fail: fn(&FetchSource) -> bool,
        seen: Mutex<Vec<String>>,
    }

    impl ScriptedFetcher {
        fn new() -> Self {
            ScriptedFetcher {
                delay: Duration::ZERO,
                fail: |_| false,
                seen: Mutex::new(Vec::new()),
            }
        }

        fn delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        fn fail_if(mut self, fail: fn(&FetchSource) -> bool) -> Self {
            self.fail = fail;
            self
        }

        fn seen(&self) -> Vec<String> {
            self.seen.lock().unwrap().clone()
        }
    }

    impl Fetcher for ScriptedFetcher {
        fn fetch(&self, request: &FetchRequest) -> FetchResponse {
            self.seen.lock().unwrap().push(match request.source {
                FetchSource::Rsync(ref uri) => format!("rsync {}", uri),
                FetchSource::Https(ref uri) => format!("https {}", uri),
                FetchSource::Rrdp(ref uri) => format!("rrdp {}", uri),
            });
            thread::sleep(self.delay);
            if (self.fail)(&request.source) {
                FetchResponse::failure(request)
            }
            else {
                FetchResponse::success(request, None)
            }
        }
    }

    /// Publishes the manifest, CRL, and files of a CA into a tree.
    ///
    /// The tree is either `"repo"` or `"valid"`. The manifest is valid
    /// until `next_update`.
    fn publish(
        dir: &TestDir, tree: &str, seed: u8, next_update: &str,
        files: &[(&str, Vec<u8>)],
    ) {
        let base = format!("{}/example.net/repo/ca{}", tree, seed);
        let crl = CrlBuilder::new(seed).to_vec();
        let mut items = vec![file_and_hash(&format!("ca{}.crl", seed), &crl)];
        dir.write(format!("{}/ca{}.crl", base, seed), &crl);
        for (name, data) in files {
            items.push(file_and_hash(name, data));
            dir.write(format!("{}/{}", base, name), data);
        }
        dir.write(
            format!("{}/ca{}.mft", base, seed),
            &manifest(
                "01", "2020-01-01T00:00:00Z", next_update, items,
                &CertBuilder::ee(seed + 100).issuer(seed),
            )
        );
    }

    fn trust_anchor() -> CertBuilder {
        CertBuilder::ca(1)
            .as_resources(&["0-4294967295"])
            .ipv4(&["0.0.0.0/0"])
            .ipv6(&["::/0"])
    }

    fn config(dir: &TestDir) -> Config {
        Config {
            cache_dir: dir.path().into(),
            .. Default::default()
        }
    }

    async fn validate(dir: &TestDir, fetcher: Arc<dyn Fetcher>) -> Outcome {
        run(
            &config(dir), vec![tal("ta", 1)], JsonProvider, fetcher
        ).await.unwrap()
    }

    #[tokio::test]
    async fn end_to_end() {
        let dir = TestDir::new();
        dir.write("ta/ta.cer", &trust_anchor().to_vec());
        let ca = CertBuilder::ca(2).issuer(1)
            .as_resources(&["65000"])
            .ipv4(&["10.0.0.0/8"]);
        publish(&dir, "repo", 1, "2100-01-01T00:00:00Z", &[
            ("ca2.cer", ca.to_vec())
        ]);
        let ee = CertBuilder::ee(21).issuer(2).ipv4(&["10.0.0.0/24"]);
        publish(&dir, "repo", 2, "2100-01-01T00:00:00Z", &[
            ("route.roa", roa(65000, &[("10.0.0.0/24", 24)], &ee)),
        ]);

        let outcome = validate(&dir, Arc::new(fetch::LocalFetcher)).await;
        let vrps: Vec<_> = outcome.output.vrps().collect();
        assert_eq!(vrps.len(), 1);
        assert_eq!(vrps[0].asid(), Asn::from_u32(65000));
        assert_eq!(vrps[0].max_len(), 24);
        assert_eq!(vrps[0].tal(), "ta");
        assert_eq!(vrps[0].to_string(), "AS65000,10.0.0.0/24,24,ta");

        let stats = &outcome.stats;
        assert_eq!(stats.object(ObjectType::Cer).valid, 2);
        assert_eq!(stats.object(ObjectType::Mft).valid, 2);
        assert_eq!(stats.object(ObjectType::Crl).valid, 2);
        assert_eq!(stats.object(ObjectType::Roa).valid, 1);
        assert_eq!(stats.repos_synced(), 2);
        assert_eq!(stats.repos_fallback(), 0);

        // Everything has been promoted into the validated tree.
        assert!(
            dir.path().join("valid/example.net/repo/ca2/route.roa").exists()
        );
    }

    #[tokio::test]
    async fn stale_manifest_containment() {
        let dir = TestDir::new();
        dir.write("ta/ta.cer", &trust_anchor().to_vec());
        let stale = CertBuilder::ca(2).issuer(1)
            .as_resources(&["65000"]).ipv4(&["10.0.0.0/16"]);
        let fresh = CertBuilder::ca(3).issuer(1)
            .as_resources(&["65001"]).ipv4(&["10.1.0.0/16"]);
        publish(&dir, "repo", 1, "2100-01-01T00:00:00Z", &[
            ("ca2.cer", stale.to_vec()), ("ca3.cer", fresh.to_vec()),
        ]);
        let ee = CertBuilder::ee(21).issuer(2).ipv4(&["10.0.0.0/24"]);
        publish(&dir, "repo", 2, "2021-01-01T00:00:00Z", &[
            ("a.roa", roa(65000, &[("10.0.0.0/24", 24)], &ee)),
        ]);
        let ee = CertBuilder::ee(31).issuer(3).ipv4(&["10.1.0.0/24"]);
        publish(&dir, "repo", 3, "2100-01-01T00:00:00Z", &[
            ("b.roa", roa(65001, &[("10.1.0.0/24", 24)], &ee)),
        ]);

        let outcome = validate(&dir, Arc::new(fetch::LocalFetcher)).await;
        let vrps: Vec<_> = outcome.output.vrps().map(|vrp| {
            vrp.to_string()
        }).collect();
        assert_eq!(vrps, ["AS65001,10.1.0.0/24,24,ta"]);
        let mft = outcome.stats.object(ObjectType::Mft);
        assert_eq!(mft.valid, 2);
        assert_eq!(mft.stale, 1);
        assert_eq!(outcome.stats.object(ObjectType::Cer).valid, 3);
        assert_eq!(outcome.stats.object(ObjectType::Roa).total, 1);
    }

    #[tokio::test]
    async fn fall_back_to_validated_cache() {
        let dir = TestDir::new();
        dir.write("ta/ta.cer", &trust_anchor().to_vec());
        let ca = CertBuilder::ca(2).issuer(1)
            .as_resources(&["65000"]).ipv4(&["10.0.0.0/8"]);
        publish(&dir, "valid", 1, "2100-01-01T00:00:00Z", &[
            ("ca2.cer", ca.to_vec())
        ]);
        let ee = CertBuilder::ee(21).issuer(2).ipv4(&["10.0.0.0/24"]);
        publish(&dir, "valid", 2, "2100-01-01T00:00:00Z", &[
            ("route.roa", roa(65000, &[("10.0.0.0/24", 24)], &ee)),
        ]);
        // A broken fetched tree must not be used.
        publish(&dir, "repo", 2, "2100-01-01T00:00:00Z", &[]);

        let outcome = validate(&dir, Arc::new(FailingFetcher)).await;
        assert_eq!(outcome.output.vrps_unique(), 1);
        assert_eq!(outcome.stats.repos_synced(), 0);
        assert_eq!(outcome.stats.repos_fallback(), 2);
    }

    /// Publishes a TA, one CA, and one ROA into the given tree.
    fn publish_single_roa(dir: &TestDir, tree: &str, ta: CertBuilder) {
        dir.write("ta/ta.cer", &ta.to_vec());
        let ca = CertBuilder::ca(2).issuer(1)
            .as_resources(&["65000"]).ipv4(&["10.0.0.0/8"]);
        publish(dir, tree, 1, "2100-01-01T00:00:00Z", &[
            ("ca2.cer", ca.to_vec())
        ]);
        let ee = CertBuilder::ee(21).issuer(2).ipv4(&["10.0.0.0/24"]);
        publish(dir, tree, 2, "2100-01-01T00:00:00Z", &[
            ("route.roa", roa(65000, &[("10.0.0.0/24", 24)], &ee)),
        ]);
    }

    #[tokio::test]
    async fn slow_repository_falls_back_to_cache() {
        let dir = TestDir::new();
        publish_single_roa(&dir, "valid", trust_anchor());
        let config = Config {
            repo_timeout: Duration::from_millis(100),
            .. config(&dir)
        };
        let fetcher = Arc::new(
            ScriptedFetcher::new().delay(Duration::from_millis(1500))
        );
        let outcome = run(
            &config, vec![tal("ta", 1)], JsonProvider, fetcher
        ).await.unwrap();
        assert_eq!(outcome.output.vrps_unique(), 1);
        assert_eq!(outcome.stats.repos_synced(), 0);
        assert_eq!(outcome.stats.repos_fallback(), 2);
    }

    #[tokio::test]
    async fn watchdog_aborts_run() {
        let dir = TestDir::new();
        publish_single_roa(&dir, "valid", trust_anchor());
        let config = Config {
            watchdog: Duration::from_millis(100),
            repo_timeout: Duration::from_secs(60),
            .. config(&dir)
        };
        let fetcher = Arc::new(
            ScriptedFetcher::new().delay(Duration::from_secs(1))
        );
        let res = run(
            &config, vec![tal("ta", 1)], JsonProvider, fetcher
        ).await;
        assert!(matches!(res, Err(Fatal::Watchdog)));
    }

    #[tokio::test]
    async fn failed_rrdp_falls_back_to_rsync() {
        let dir = TestDir::new();
        publish_single_roa(
            &dir, "repo",
            trust_anchor().notify("https://example.net/notification.xml"),
        );
        let config = Config { prefer_rrdp: true, .. config(&dir) };
        let fetcher = Arc::new(
            ScriptedFetcher::new().fail_if(FetchSource::is_rrdp)
        );
        let outcome = run(
            &config, vec![tal("ta", 1)], JsonProvider, fetcher.clone()
        ).await.unwrap();
        assert_eq!(outcome.output.vrps_unique(), 1);
        assert_eq!(outcome.stats.repos_synced(), 2);
        assert_eq!(outcome.stats.repos_fallback(), 0);
        assert_eq!(fetcher.seen(), [
            "rsync rsync://example.net/ta/ta.cer",
            "rrdp https://example.net/notification.xml",
            "rsync rsync://example.net/repo/",
        ]);
    }

    #[tokio::test]
    async fn failed_tal_uri_tries_next() {
        let dir = TestDir::new();
        publish_single_roa(&dir, "repo", trust_anchor());
        let tal = tal_with_uris("ta", 1, &[
            "rsync://example.net/ta/gone.cer",
            "rsync://example.net/ta/ta.cer",
        ]);
        let fetcher = Arc::new(ScriptedFetcher::new().fail_if(|source| {
            matches!(
                *source,
                FetchSource::Rsync(ref uri) if uri.path().ends_with("gone.cer")
            )
        }));
        let outcome = run(
            &config(&dir), vec![tal], JsonProvider, fetcher.clone()
        ).await.unwrap();
        assert_eq!(outcome.output.vrps_unique(), 1);
        assert_eq!(outcome.stats.repos_synced(), 2);
        assert_eq!(outcome.stats.repos_fallback(), 0);
        assert_eq!(&fetcher.seen()[..2], [
            "rsync rsync://example.net/ta/gone.cer",
            "rsync rsync://example.net/ta/ta.cer",
        ]);
    }

    #[tokio::test]
    async fn duplicates() {
        let dir = TestDir::new();
        dir.write("ta/ta.cer", &trust_anchor().to_vec());
        let ca = CertBuilder::ca(2).issuer(1)
            .as_resources(&["65000"]).ipv4(&["10.0.0.0/8"]);
        let twin = ca.clone().serial(99);
        publish(&dir, "repo", 1, "2100-01-01T00:00:00Z", &[
            ("ca2.cer", ca.to_vec()), ("twin.cer", twin.to_vec()),
        ]);
        let early = CertBuilder::ee(21).issuer(2).ipv4(&["10.0.0.0/24"])
            .not_after("2090-01-01T00:00:00Z");
        let late = CertBuilder::ee(22).issuer(2).ipv4(&["10.0.0.0/16"]);
        publish(&dir, "repo", 2, "2100-01-01T00:00:00Z", &[
            ("a.roa", roa(65000, &[("10.0.0.0/24", 24)], &early)),
            ("b.roa", roa(65000, &[("10.0.0.0/24", 24)], &late)),
        ]);

        let outcome = validate(&dir, Arc::new(fetch::LocalFetcher)).await;
        assert_eq!(outcome.output.vrps_total(), 2);
        assert_eq!(outcome.output.vrps_unique(), 1);
        let vrp = outcome.output.vrps().next().unwrap();
        assert_eq!(vrp.expires().to_string(), "2090-01-01T00:00:00Z");

        // The second certificate with the same key is rejected.
        let cer = outcome.stats.object(ObjectType::Cer);
        assert_eq!(cer.valid, 2);
        assert_eq!(cer.chain_failed, 1);
    }

    #[tokio::test]
    async fn uncovered_roa_is_rejected() {
        let dir = TestDir::new();
        dir.write("ta/ta.cer", &trust_anchor().to_vec());
        let ca = CertBuilder::ca(2).issuer(1)
            .as_resources(&["65000"]).ipv4(&["10.0.0.0/8"]);
        publish(&dir, "repo", 1, "2100-01-01T00:00:00Z", &[
            ("ca2.cer", ca.to_vec())
        ]);
        let ee = CertBuilder::ee(21).issuer(2).ipv4(&["inherit"]);
        publish(&dir, "repo", 2, "2100-01-01T00:00:00Z", &[
            ("ok.roa", roa(65000, &[("10.1.0.0/16", 24)], &ee)),
            ("bad.roa", roa(65000, &[("11.0.0.0/16", 16)], &ee)),
        ]);

        let outcome = validate(&dir, Arc::new(fetch::LocalFetcher)).await;
        let vrps: Vec<_> = outcome.output.vrps().map(|vrp| {
            vrp.to_string()
        }).collect();
        assert_eq!(vrps, ["AS65000,10.1.0.0/16,24,ta"]);
        assert_eq!(outcome.stats.object(ObjectType::Roa).chain_failed, 1);
    }

    #[tokio::test]
    async fn aspa_and_router_keys() {
        let dir = TestDir::new();
        dir.write("ta/ta.cer", &trust_anchor().to_vec());
        let ca = CertBuilder::ca(2).issuer(1)
            .as_resources(&["65000-65010"]);
        publish(&dir, "repo", 1, "2100-01-01T00:00:00Z", &[
            ("ca2.cer", ca.to_vec())
        ]);
        let router = CertBuilder::router(23).issuer(2)
            .as_resources(&["65001-65002"]);
        let ee = CertBuilder::ee(21).issuer(2).as_resources(&["65000"]);
        publish(&dir, "repo", 2, "2100-01-01T00:00:00Z", &[
            ("router.cer", router.to_vec()),
            ("customer.asa", aspa(65000, &["AS65100", "AS65200"], &ee)),
        ]);

        let outcome = validate(&dir, Arc::new(fetch::LocalFetcher)).await;
        assert_eq!(outcome.output.vaps_unique(), 2);
        assert_eq!(outcome.output.router_keys_unique(), 2);
        let keys: Vec<_> = outcome.output.router_keys().map(|key| {
            key.asid()
        }).collect();
        assert_eq!(keys, [Asn::from_u32(65001), Asn::from_u32(65002)]);
        assert!(outcome.output.vaps().all(|vap| {
            vap.providers().len() == 2
        }));
    }

    #[tokio::test]
    async fn missing_trust_anchor() {
        let dir = TestDir::new();
        let outcome = validate(&dir, Arc::new(fetch::LocalFetcher)).await;
        assert_eq!(outcome.output.vrps_unique(), 0);
        assert_eq!(outcome.stats.object(ObjectType::Cer).chain_failed, 1);
    }
}
