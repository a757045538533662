//! In-memory platform with per-candidate scripted responses.

use std::{
    collections::{HashMap, VecDeque},
    sync::Mutex,
};

use async_trait::async_trait;

use crate::{
    domain::{Contact, GroupDescriptor, GroupId, Participant, PeerRef},
    platform::{port::PlatformResult, PlatformClient, PlatformError},
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Call {
    Resolve(String),
    Invite(String),
    Add { key: String, forward_limit: u32 },
}

#[derive(Default)]
pub(crate) struct ScriptedPlatform {
    pub dialogs: Vec<GroupDescriptor>,
    pub contacts: Vec<Contact>,
    pub participants: Vec<Participant>,
    resolve_script: Mutex<HashMap<String, VecDeque<PlatformError>>>,
    add_script: Mutex<HashMap<String, VecDeque<PlatformResult<()>>>>,
    peers: Mutex<HashMap<i64, String>>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a resolution failure for `key`; once drained, resolution succeeds.
    pub fn fail_resolve(&self, key: &str, err: PlatformError) {
        self.resolve_script
            .lock()
            .unwrap()
            .entry(key.to_string())
            .or_default()
            .push_back(err);
    }

    /// Queue add/invite responses for `key`; once drained, adds succeed.
    pub fn script_add(&self, key: &str, responses: Vec<PlatformResult<()>>) {
        self.add_script
            .lock()
            .unwrap()
            .entry(key.to_string())
            .or_default()
            .extend(responses);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn add_calls_for(&self, key: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| match c {
                Call::Invite(k) => k == key,
                Call::Add { key: k, .. } => k == key,
                Call::Resolve(_) => false,
            })
            .count()
    }

    fn key_for(&self, peer: &PeerRef) -> String {
        self.peers
            .lock()
            .unwrap()
            .get(&peer.user_id)
            .cloned()
            .unwrap_or_default()
    }

    fn next_add(&self, key: &str) -> PlatformResult<()> {
        self.add_script
            .lock()
            .unwrap()
            .get_mut(key)
            .and_then(|q| q.pop_front())
            .unwrap_or(Ok(()))
    }
}

#[async_trait]
impl PlatformClient for ScriptedPlatform {
    async fn list_dialogs(&self) -> PlatformResult<Vec<GroupDescriptor>> {
        Ok(self.dialogs.clone())
    }

    async fn list_participants(&self, _group: &GroupDescriptor) -> PlatformResult<Vec<Participant>> {
        Ok(self.participants.clone())
    }

    async fn list_contacts(&self) -> PlatformResult<Vec<Contact>> {
        Ok(self.contacts.clone())
    }

    async fn resolve_identity(&self, key: &str) -> PlatformResult<PeerRef> {
        self.calls.lock().unwrap().push(Call::Resolve(key.to_string()));
        if let Some(err) = self
            .resolve_script
            .lock()
            .unwrap()
            .get_mut(key)
            .and_then(|q| q.pop_front())
        {
            return Err(err);
        }
        let mut peers = self.peers.lock().unwrap();
        let user_id = peers.len() as i64 + 1000;
        peers.insert(user_id, key.to_string());
        Ok(PeerRef {
            user_id,
            access_hash: Some(user_id * 7),
        })
    }

    async fn invite_to_channel(&self, _channel: GroupId, peer: &PeerRef) -> PlatformResult<()> {
        let key = self.key_for(peer);
        self.calls.lock().unwrap().push(Call::Invite(key.clone()));
        self.next_add(&key)
    }

    async fn add_to_basic_group(
        &self,
        _group: GroupId,
        peer: &PeerRef,
        forward_limit: u32,
    ) -> PlatformResult<()> {
        let key = self.key_for(peer);
        self.calls.lock().unwrap().push(Call::Add {
            key: key.clone(),
            forward_limit,
        });
        self.next_add(&key)
    }
}
