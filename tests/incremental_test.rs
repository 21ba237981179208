mod support;

use albumsync::{identity::SelfIdentity, types::SyncMode};
use support::{
   FrameScript, MemorySource, ScriptedFrames, TestEngine, asset_blob, comment_blob, like_blob,
};
use tempfile::TempDir;

fn trip_source() -> std::sync::Arc<MemorySource> {
   let source = MemorySource::new();
   source.add_album("trip", "Trip");
   source.add_asset("trip", "a1", 100.0, asset_blob("IMG_0001.JPG", "Ana"));
   source.add_asset("trip", "a2", 200.0, asset_blob("IMG_0002.JPG", "Bo"));
   source.add_comment("a1", "c1", 150.0, false, comment_blob("Bo", "first"));
   source
}

fn messages(engine: &TestEngine) -> Vec<String> {
   engine.transport.sent().into_iter().map(|s| s.message).collect()
}

#[tokio::test]
async fn unchanged_source_is_idempotent() {
   let assets = TempDir::new().expect("assets dir");
   let engine = TestEngine::new(trip_source(), ScriptedFrames::new(FrameScript::Fail), assets.path());

   engine
      .orchestrator
      .run_pass(SyncMode::Full, &mut ())
      .await
      .expect("full pass");
   let decoded_after_full = engine.decoder.calls();
   let after_full = engine.catalog().albums_json().expect("json");

   engine
      .orchestrator
      .run_pass(SyncMode::Incremental, &mut ())
      .await
      .expect("first incremental");
   let first = engine.catalog().albums();
   let first_json = engine.catalog().albums_json().expect("json");

   let report = engine
      .orchestrator
      .run_pass(SyncMode::Incremental, &mut ())
      .await
      .expect("second incremental");

   assert_eq!(engine.decoder.calls(), decoded_after_full);
   assert_eq!(report.new_assets, 0);
   assert_eq!(report.reused_assets, 2);
   assert_eq!(report.new_comments, 0);
   assert_eq!(engine.catalog().albums(), first);
   assert_eq!(engine.catalog().albums_json().expect("json"), first_json);
   assert_eq!(first_json, after_full);
   assert!(engine.transport.sent().is_empty());
}

#[tokio::test]
async fn known_assets_are_reused_verbatim() {
   let assets = TempDir::new().expect("assets dir");
   let source = trip_source();
   let engine = TestEngine::new(source.clone(), ScriptedFrames::new(FrameScript::Fail), assets.path());

   engine
      .orchestrator
      .run_pass(SyncMode::Full, &mut ())
      .await
      .expect("full pass");
   let before = engine.catalog().album("trip").expect("trip").assets["a1"].clone();

   // Same GUID again with a different blob: the stored asset wins.
   source.add_asset("trip", "a1", 100.0, asset_blob("RENAMED.JPG", "Someone"));
   engine
      .orchestrator
      .run_pass(SyncMode::Incremental, &mut ())
      .await
      .expect("incremental");

   let after = engine.catalog().album("trip").expect("trip").assets["a1"].clone();
   assert_eq!(after, before);
}

#[tokio::test]
async fn new_comments_fire_one_notification() {
   let assets = TempDir::new().expect("assets dir");
   let source = trip_source();
   let engine = TestEngine::new(source.clone(), ScriptedFrames::new(FrameScript::Fail), assets.path());

   engine
      .orchestrator
      .run_pass(SyncMode::Full, &mut ())
      .await
      .expect("full pass");

   source.add_comment("a2", "c2", 300.0, false, comment_blob("Ana", "wow"));
   source.add_comment("a2", "c3", 310.0, false, like_blob("Cy"));

   let report = engine
      .orchestrator
      .run_pass(SyncMode::Incremental, &mut ())
      .await
      .expect("incremental");

   assert_eq!(report.new_assets, 0);
   assert_eq!(report.new_comments, 2);
   assert_eq!(messages(&engine), ["2 new comments"]);
   let sent = engine.transport.sent();
   assert_eq!(sent[0].title, "Trip");
   assert_eq!(sent[0].recipients, ["token"]);
}

#[tokio::test]
async fn comment_merge_is_additive_and_moves_sorting_date() {
   let assets = TempDir::new().expect("assets dir");
   let source = trip_source();
   let engine = TestEngine::new(source.clone(), ScriptedFrames::new(FrameScript::Fail), assets.path());

   engine
      .orchestrator
      .run_pass(SyncMode::Full, &mut ())
      .await
      .expect("full pass");
   let before = engine.catalog().album("trip").expect("trip");
   let a1_before = before.assets["a1"].clone();
   let a2_before = before.assets["a2"].clone();
   assert_eq!(a1_before.comments.len(), 1);

   source.add_comment("a1", "c9", 5_000.0, false, comment_blob("Cy", "late"));
   engine
      .orchestrator
      .run_pass(SyncMode::Incremental, &mut ())
      .await
      .expect("incremental");

   let after = engine.catalog().album("trip").expect("trip");
   let a1 = &after.assets["a1"];
   assert_eq!(a1.comments.len(), 2);
   assert!(a1.comments.contains_key("c1"));
   assert!(a1.sorting_date > a1_before.sorting_date);
   assert_eq!(a1.sorting_date, a1.comments["c9"].date);
   assert_eq!(after.assets["a2"].sorting_date, a2_before.sorting_date);
   assert_eq!(after.cover_photo, a1.path);
   assert_eq!(after.last_photo_date, Some(a1.sorting_date));
   assert_eq!(messages(&engine), ["1 new comment"]);
}

#[tokio::test]
async fn new_assets_notify_per_author() {
   let assets = TempDir::new().expect("assets dir");
   let source = trip_source();
   let engine = TestEngine::new(source.clone(), ScriptedFrames::new(FrameScript::Fail), assets.path());

   engine
      .orchestrator
      .run_pass(SyncMode::Full, &mut ())
      .await
      .expect("full pass");

   source.add_asset("trip", "a3", 400.0, asset_blob("IMG_0003.JPG", "Bo"));
   source.add_asset("trip", "a4", 500.0, asset_blob("IMG_0004.JPG", "Bo"));
   source.add_asset("trip", "a5", 600.0, asset_blob("IMG_0005.JPG", "Cy"));

   let report = engine
      .orchestrator
      .run_pass(SyncMode::Incremental, &mut ())
      .await
      .expect("incremental");

   assert_eq!(report.new_assets, 3);
   assert_eq!(report.notifications, 2);
   assert_eq!(messages(&engine), ["Bo posted 2 new photos.", "Cy posted a new photo."]);
   assert_eq!(engine.catalog().album("trip").expect("trip").assets.len(), 5);
}

#[tokio::test]
async fn own_posts_are_not_notified() {
   let assets = TempDir::new().expect("assets dir");
   let source = trip_source();
   source.add_comment("a2", "mine", 250.0, true, comment_blob("Ana", "my caption"));
   let engine = TestEngine::new(source.clone(), ScriptedFrames::new(FrameScript::Fail), assets.path());

   engine
      .orchestrator
      .run_pass(SyncMode::Full, &mut ())
      .await
      .expect("full pass");
   assert_eq!(engine.identity.get().as_deref(), Some("Ana"));

   source.add_asset("trip", "a3", 400.0, asset_blob("IMG_0003.JPG", "Ana"));
   source.add_asset("trip", "a4", 500.0, asset_blob("IMG_0004.JPG", "Bo"));
   engine
      .orchestrator
      .run_pass(SyncMode::Incremental, &mut ())
      .await
      .expect("incremental");

   assert_eq!(messages(&engine), ["Bo posted a new photo."]);
}

#[tokio::test]
async fn preset_identity_suppresses_from_the_first_incremental() {
   let assets = TempDir::new().expect("assets dir");
   let source = trip_source();
   let engine = TestEngine::with_identity(
      source.clone(),
      ScriptedFrames::new(FrameScript::Fail),
      assets.path(),
      SelfIdentity::with_name("Bo"),
   );

   engine
      .orchestrator
      .run_pass(SyncMode::Full, &mut ())
      .await
      .expect("full pass");
   source.add_asset("trip", "a3", 400.0, asset_blob("IMG_0003.JPG", "Bo"));
   engine
      .orchestrator
      .run_pass(SyncMode::Incremental, &mut ())
      .await
      .expect("incremental");

   assert!(engine.transport.sent().is_empty());
}

#[tokio::test]
async fn album_first_seen_incrementally_is_ingested_and_notified() {
   let assets = TempDir::new().expect("assets dir");
   let source = trip_source();
   let engine = TestEngine::new(source.clone(), ScriptedFrames::new(FrameScript::Fail), assets.path());

   engine
      .orchestrator
      .run_pass(SyncMode::Full, &mut ())
      .await
      .expect("full pass");

   source.add_album("beach", "Beach");
   source.add_asset("beach", "b1", 700.0, asset_blob("IMG_0100.JPG", "Cy"));
   engine
      .orchestrator
      .run_pass(SyncMode::Incremental, &mut ())
      .await
      .expect("incremental");

   assert_eq!(engine.catalog().len(), 2);
   let sent = engine.transport.sent();
   assert_eq!(sent.len(), 1);
   assert_eq!(sent[0].title, "Beach");
   assert_eq!(sent[0].message, "Cy posted a new photo.");

   let list = engine.catalog().album_list();
   assert_eq!(list[0].guid, "beach");
}

#[tokio::test]
async fn albums_merged_before_a_failure_are_still_notified() {
   let assets = TempDir::new().expect("assets dir");
   let source = trip_source();
   source.add_album("beach", "Beach");
   source.add_asset("beach", "b1", 700.0, asset_blob("IMG_0100.JPG", "Ana"));
   let engine = TestEngine::new(source.clone(), ScriptedFrames::new(FrameScript::Fail), assets.path());

   engine
      .orchestrator
      .run_pass(SyncMode::Full, &mut ())
      .await
      .expect("full pass");

   source.add_asset("trip", "a3", 400.0, asset_blob("IMG_0003.JPG", "Cy"));
   source.set_broken_album(Some("beach"));
   engine
      .orchestrator
      .run_pass(SyncMode::Incremental, &mut ())
      .await
      .expect_err("beach query fails");

   assert!(engine.catalog().album("trip").expect("trip").assets.contains_key("a3"));
   assert_eq!(messages(&engine), ["Cy posted a new photo."]);
   assert_eq!(engine.transport.sent()[0].title, "Trip");

   engine.transport.clear();
   source.set_broken_album(None);
   let report = engine
      .orchestrator
      .run_pass(SyncMode::Incremental, &mut ())
      .await
      .expect("retry");

   assert_eq!(report.new_assets, 0);
   assert!(engine.transport.sent().is_empty());
}

#[tokio::test]
async fn assets_without_an_author_are_not_announced() {
   let assets = TempDir::new().expect("assets dir");
   let source = trip_source();
   let engine = TestEngine::new(source.clone(), ScriptedFrames::new(FrameScript::Fail), assets.path());

   engine
      .orchestrator
      .run_pass(SyncMode::Full, &mut ())
      .await
      .expect("full pass");

   source.add_asset("trip", "a3", 400.0, asset_blob("IMG_0003.JPG", ""));
   source.add_asset("trip", "a4", 500.0, asset_blob("IMG_0004.JPG", "Cy"));
   let report = engine
      .orchestrator
      .run_pass(SyncMode::Incremental, &mut ())
      .await
      .expect("incremental");

   assert_eq!(report.new_assets, 2);
   assert_eq!(messages(&engine), ["Cy posted a new photo."]);
   assert!(engine.catalog().album("trip").expect("trip").assets.contains_key("a3"));
}
