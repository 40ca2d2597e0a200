use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use autoposter::{
    CampaignManager, CampaignState, ContentGenerator, ContentRequest, CreateCampaignDraft, Error,
    JsonSnapshotStore, Platform, Post, PostId, PostStatus, UserId,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

fn scratch_dir() -> PathBuf {
    std::env::temp_dir().join(format!("autoposter-lifecycle-test-{}", Uuid::new_v4()))
}

/// Generator handing out a pre-scripted plan, one call at a time.
struct ScriptedGenerator {
    plans: Mutex<Vec<Vec<Post>>>,
}

impl ScriptedGenerator {
    fn with_plan(posts: Vec<Post>) -> ScriptedGenerator {
        ScriptedGenerator {
            plans: Mutex::new(vec![posts]),
        }
    }
}

#[async_trait]
impl ContentGenerator for ScriptedGenerator {
    async fn generate_campaign_content(
        &self,
        _request: &ContentRequest,
    ) -> Result<Vec<Post>, Error> {
        Ok(self.plans.lock().unwrap().pop().unwrap_or_default())
    }

    async fn generate_post_image(
        &self,
        _prompt: &str,
        _reference_image: Option<&str>,
    ) -> Result<Option<String>, Error> {
        Ok(None)
    }
}

fn pending_post(day: u32, title: &str) -> Post {
    Post {
        id: PostId::new(),
        day,
        title: title.to_string(),
        content: format!("{} content", title),
        hashtags: vec!["#Trend".to_string()],
        image_prompt: None,
        image_url: None,
        status: PostStatus::Pending,
        scheduled_time: Some(Utc::now()),
    }
}

fn draft() -> CreateCampaignDraft {
    CreateCampaignDraft {
        title: "t".to_string(),
        topic: "x".to_string(),
        target_audience: String::new(),
        posts_per_day: 1,
        duration_days: 2,
        platforms: vec![Platform::Twitter],
        reference_image: None,
        reference_image_type: None,
    }
}

#[tokio::test]
async fn campaign_lifecycle_survives_reload() {
    init_tracing();
    let dir = scratch_dir();

    let p1 = pending_post(1, "one");
    let p2 = pending_post(2, "two");
    let (p1_id, p2_id) = (p1.id, p2.id);

    let store = Arc::new(JsonSnapshotStore::new(&dir));
    let generator = Arc::new(ScriptedGenerator::with_plan(vec![p1, p2]));

    let mut manager = CampaignManager::load(store.clone(), generator.clone()).await;
    let campaign = manager
        .create_campaign(UserId::new(), draft())
        .await
        .unwrap();
    let campaign_id = campaign.id;

    assert_eq!(campaign.state, CampaignState::Created);
    let order: Vec<PostId> = campaign.posts.iter().map(|post| post.id).collect();
    assert_eq!(order, vec![p1_id, p2_id]);

    manager.delete_post(campaign_id, p1_id);
    let campaign = manager.campaign_by_id(campaign_id).unwrap();
    let order: Vec<PostId> = campaign.posts.iter().map(|post| post.id).collect();
    assert_eq!(order, vec![p2_id]);
    manager.flush().await;

    // A fresh session sees the edited campaign.
    let reloaded = CampaignManager::load(store.clone(), generator.clone()).await;
    let campaign = reloaded.campaign_by_id(campaign_id).unwrap();
    assert_eq!(campaign.posts.len(), 1);
    assert_eq!(campaign.posts[0].id, p2_id);

    assert!(manager.delete_campaign(campaign_id));
    assert!(manager.campaigns().is_empty());
    manager.flush().await;

    let reloaded = CampaignManager::load(store, generator).await;
    assert!(reloaded.campaigns().is_empty());

    let _ = tokio::fs::remove_dir_all(&dir).await;
}

#[tokio::test]
async fn legacy_export_is_migrated_into_the_snapshot() {
    init_tracing();
    let dir = scratch_dir();
    tokio::fs::create_dir_all(&dir).await.unwrap();
    let legacy_path = dir.join("app_campaigns.json");

    // Seed a legacy flat export the way an older deployment wrote it,
    // then open a session against the empty primary store.
    let p1 = pending_post(1, "one");
    let seed_store = Arc::new(JsonSnapshotStore::new(dir.join("unused")));
    let seed_generator = Arc::new(ScriptedGenerator::with_plan(vec![p1]));
    let mut seeder = CampaignManager::load(seed_store, seed_generator).await;
    let campaign_id = seeder
        .create_campaign(UserId::new(), draft())
        .await
        .unwrap()
        .id;
    seeder.flush().await;
    tokio::fs::write(
        &legacy_path,
        serde_json::to_vec(seeder.campaigns()).unwrap(),
    )
    .await
    .unwrap();

    let store =
        Arc::new(JsonSnapshotStore::new(&dir).with_legacy_export(&legacy_path));
    let generator = Arc::new(ScriptedGenerator::with_plan(vec![]));
    let manager = CampaignManager::load(store.clone(), generator.clone()).await;

    assert_eq!(manager.campaigns().len(), 1);
    assert_eq!(manager.campaigns()[0].id, campaign_id);
    assert!(
        tokio::fs::metadata(&legacy_path).await.is_err(),
        "legacy export should be deleted after adoption"
    );

    // After the adopting save, reloads come from the primary snapshot.
    manager.flush().await;
    drop(manager);
    let reloaded = CampaignManager::load(store, generator).await;
    assert_eq!(reloaded.campaigns().len(), 1);
    assert_eq!(reloaded.campaigns()[0].id, campaign_id);

    let _ = tokio::fs::remove_dir_all(&dir).await;
}

#[tokio::test]
async fn storage_failures_do_not_block_the_session() {
    init_tracing();

    struct BrokenStore;

    #[async_trait]
    impl autoposter::CampaignStore for BrokenStore {
        async fn load_campaigns(&self) -> Result<Option<Vec<autoposter::Campaign>>, Error> {
            Err(Error::FailedStorageCall(std::io::Error::new(
                std::io::ErrorKind::Other,
                "disk on fire",
            )))
        }

        async fn save_campaigns(&self, _campaigns: &[autoposter::Campaign]) -> Result<(), Error> {
            Err(Error::FailedStorageCall(std::io::Error::new(
                std::io::ErrorKind::Other,
                "disk still on fire",
            )))
        }
    }

    let generator = Arc::new(ScriptedGenerator::with_plan(vec![pending_post(1, "one")]));
    let mut manager = CampaignManager::load(Arc::new(BrokenStore), generator).await;

    // Load failure starts empty; mutations keep working in memory even
    // though every save fails behind the scenes.
    let campaign = manager
        .create_campaign(UserId::new(), draft())
        .await
        .unwrap();
    let campaign_id = campaign.id;
    manager.flush().await;

    assert_eq!(manager.campaigns().len(), 1);
    assert_eq!(
        manager.campaign_by_id(campaign_id).unwrap().posts.len(),
        1
    );
}
