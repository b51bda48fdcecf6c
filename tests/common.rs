use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::PathBuf;

use rusqlite::Connection;
use tempfile::TempDir;

use fossick::repo::FossilRepo;

/// Shared repository fixture for integration tests.
///
/// Builds a repository database row-by-row (blobs, manifests, events,
/// parent and file links, tags) so the real `FossilRepo` backend is
/// exercised end-to-end, and optionally materialises a working checkout
/// beside it. Content hashes are deterministic fakes; nothing in the
/// browser recomputes them.
pub struct TestRepo {
    pub _temp_dir: TempDir,
    pub db_path: PathBuf,
    conn: Connection,
    next_uuid_seed: u64,
    next_mtime: f64,
    /// name -> (uuid, blob rid) as of the latest commit.
    state: BTreeMap<String, (String, i64)>,
    last_commit: Option<(i64, String)>,
    pub commits: Vec<(i64, String)>,
}

#[allow(dead_code)]
impl TestRepo {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.fossil");
        let conn = Connection::open(&db_path).unwrap();
        conn.execute_batch(
            "CREATE TABLE blob(rid INTEGER PRIMARY KEY, size INT, uuid TEXT UNIQUE, content BLOB);\n\
             CREATE TABLE delta(rid INTEGER PRIMARY KEY, srcid INT);\n\
             CREATE TABLE event(type TEXT, mtime REAL, objid INT, euser TEXT, user TEXT,\n\
                                ecomment TEXT, comment TEXT);\n\
             CREATE TABLE plink(pid INT, cid INT, isprim BOOLEAN);\n\
             CREATE TABLE mlink(mid INT, fid INT, pid INT, fnid INT, pfnid INT,\n\
                                isaux BOOLEAN, mperm INT);\n\
             CREATE TABLE filename(fnid INTEGER PRIMARY KEY, name TEXT UNIQUE);\n\
             CREATE TABLE tag(tagid INTEGER PRIMARY KEY, tagname TEXT UNIQUE);\n\
             CREATE TABLE tagxref(tagid INT, tagtype INT, rid INT, value TEXT, mtime REAL);\n\
             CREATE TABLE config(name TEXT PRIMARY KEY, value TEXT);\n\
             INSERT INTO config(name, value) VALUES('main-branch', 'trunk');",
        )
        .unwrap();
        TestRepo {
            _temp_dir: temp_dir,
            db_path,
            conn,
            next_uuid_seed: 1,
            next_mtime: 2_460_000.5, // arbitrary Julian-day base
            state: BTreeMap::new(),
            last_commit: None,
            commits: Vec::new(),
        }
    }

    /// Open a `FossilRepo` handle to this repository for use with
    /// library functions.
    pub fn repo(&self) -> FossilRepo {
        FossilRepo::open(&self.db_path).unwrap()
    }

    fn fake_uuid(&mut self) -> String {
        let mut x = self
            .next_uuid_seed
            .wrapping_mul(0x9E37_79B9_7F4A_7C15)
            .wrapping_add(0xDEAD_BEEF);
        self.next_uuid_seed += 1;
        let mut s = String::new();
        for _ in 0..3 {
            x ^= x >> 33;
            x = x.wrapping_mul(0xFF51_AFD7_ED55_8CCD);
            s.push_str(&format!("{x:016x}"));
        }
        s.truncate(40);
        s
    }

    fn bump_mtime(&mut self) -> f64 {
        self.next_mtime += 0.001;
        self.next_mtime
    }

    /// Store a blob the way the repository does: 4-byte big-endian size
    /// followed by a zlib stream.
    fn add_blob(&mut self, uuid: &str, content: &[u8]) -> i64 {
        let mut record = (content.len() as u32).to_be_bytes().to_vec();
        let mut enc =
            flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        enc.write_all(content).unwrap();
        record.extend_from_slice(&enc.finish().unwrap());
        self.conn
            .execute(
                "INSERT INTO blob(size, uuid, content) VALUES(?1, ?2, ?3)",
                rusqlite::params![content.len() as i64, uuid, record],
            )
            .unwrap();
        self.conn.last_insert_rowid()
    }

    fn fnid(&self, name: &str) -> i64 {
        self.conn
            .execute(
                "INSERT OR IGNORE INTO filename(name) VALUES(?1)",
                [name],
            )
            .unwrap();
        self.conn
            .query_row("SELECT fnid FROM filename WHERE name = ?1", [name], |r| {
                r.get(0)
            })
            .unwrap()
    }

    fn tag_rid(&self, tagname: &str, rid: i64, mtime: f64) {
        self.conn
            .execute(
                "INSERT OR IGNORE INTO tag(tagname) VALUES(?1)",
                [tagname],
            )
            .unwrap();
        let tagid: i64 = self
            .conn
            .query_row("SELECT tagid FROM tag WHERE tagname = ?1", [tagname], |r| {
                r.get(0)
            })
            .unwrap();
        self.conn
            .execute(
                "INSERT INTO tagxref(tagid, tagtype, rid, value, mtime) \
                 VALUES(?1, 2, ?2, NULL, ?3)",
                rusqlite::params![tagid, rid, mtime],
            )
            .unwrap();
    }

    /// Commit a set of file updates (`content: None` removes the file).
    /// Returns (manifest rid, manifest uuid).
    pub fn commit(
        &mut self,
        comment: &str,
        user: &str,
        updates: &[(&str, Option<&str>)],
    ) -> (i64, String) {
        let branch = "trunk".to_string();
        self.commit_on(comment, user, updates, &branch)
    }

    pub fn commit_on(
        &mut self,
        comment: &str,
        user: &str,
        updates: &[(&str, Option<&str>)],
        branch: &str,
    ) -> (i64, String) {
        let prev = self.last_commit.clone();
        let prev_state = self.state.clone();

        // Apply updates to the tracked-file state.
        let mut new_blobs: Vec<(String, String, i64)> = Vec::new();
        for (name, content) in updates {
            match content {
                Some(text) => {
                    let uuid = self.fake_uuid();
                    let rid = self.add_blob(&uuid, text.as_bytes());
                    self.state
                        .insert(name.to_string(), (uuid.clone(), rid));
                    new_blobs.push((name.to_string(), uuid, rid));
                }
                None => {
                    self.state.remove(*name);
                }
            }
        }

        // Manifest text over the full post-commit state.
        let mut manifest = String::new();
        manifest.push_str(&format!("C {}\n", comment.replace(' ', "\\s")));
        manifest.push_str("D 2024-05-01T12:00:00\n");
        for (name, (uuid, _)) in &self.state {
            manifest.push_str(&format!("F {} {}\n", name.replace(' ', "\\s"), uuid));
        }
        if let Some((_, prev_uuid)) = &prev {
            manifest.push_str(&format!("P {prev_uuid}\n"));
        }
        manifest.push_str(&format!("U {user}\n"));
        manifest.push_str("Z 00000000000000000000000000000000\n");

        let manifest_uuid = self.fake_uuid();
        let mid = self.add_blob(&manifest_uuid, manifest.as_bytes());
        let mtime = self.bump_mtime();
        self.conn
            .execute(
                "INSERT INTO event(type, mtime, objid, user, comment) \
                 VALUES('ci', ?1, ?2, ?3, ?4)",
                rusqlite::params![mtime, mid, user, comment],
            )
            .unwrap();
        if let Some((prev_rid, _)) = &prev {
            self.conn
                .execute(
                    "INSERT INTO plink(pid, cid, isprim) VALUES(?1, ?2, 1)",
                    rusqlite::params![prev_rid, mid],
                )
                .unwrap();
        }
        self.tag_rid(&format!("sym-{branch}"), mid, mtime);

        // File links: one row per touched file.
        for (name, content) in updates {
            let fnid = self.fnid(name);
            match content {
                Some(_) => {
                    let (_, fid) = self.state[*name].clone();
                    let pid = prev_state.get(*name).map(|(_, rid)| *rid).unwrap_or(0);
                    self.conn
                        .execute(
                            "INSERT INTO mlink(mid, fid, pid, fnid, pfnid, isaux, mperm) \
                             VALUES(?1, ?2, ?3, ?4, 0, 0, 0)",
                            rusqlite::params![mid, fid, pid, fnid],
                        )
                        .unwrap();
                }
                None => {
                    let pid = prev_state.get(*name).map(|(_, rid)| *rid).unwrap_or(0);
                    self.conn
                        .execute(
                            "INSERT INTO mlink(mid, fid, pid, fnid, pfnid, isaux, mperm) \
                             VALUES(?1, 0, ?2, ?3, 0, 0, 0)",
                            rusqlite::params![mid, pid, fnid],
                        )
                        .unwrap();
                }
            }
        }

        self.last_commit = Some((mid, manifest_uuid.clone()));
        self.commits.push((mid, manifest_uuid.clone()));
        (mid, manifest_uuid)
    }

    /// Record a wiki event with the given page body.
    pub fn wiki(&mut self, title: &str, body: &str, comment: &str, user: &str) -> (i64, String) {
        let artifact = format!(
            "D 2024-05-01T12:00:00\nL {}\nU {user}\nW {}\n{body}\n\
             Z 00000000000000000000000000000000\n",
            title.replace(' ', "\\s"),
            body.len(),
        );
        let uuid = self.fake_uuid();
        let rid = self.add_blob(&uuid, artifact.as_bytes());
        let mtime = self.bump_mtime();
        self.conn
            .execute(
                "INSERT INTO event(type, mtime, objid, user, comment) \
                 VALUES('w', ?1, ?2, ?3, ?4)",
                rusqlite::params![mtime, rid, user, comment],
            )
            .unwrap();
        (rid, uuid)
    }

    /// Materialise a working checkout of the latest commit: files on
    /// disk, a checkout database, and the vfile table. Returns the
    /// checkout directory.
    pub fn checkout(&mut self) -> PathBuf {
        let (rid, uuid) = self.last_commit.clone().expect("nothing committed");
        let dir = self._temp_dir.path().join("checkout");
        fs::create_dir_all(&dir).unwrap();

        let ckout = Connection::open(dir.join(".fslckout")).unwrap();
        ckout
            .execute_batch(
                "CREATE TABLE vvar(name TEXT PRIMARY KEY, value TEXT);\n\
                 CREATE TABLE vfile(id INTEGER PRIMARY KEY, vid INT, chnged INT,\n\
                                    deleted BOOLEAN, isexe BOOLEAN, islink BOOLEAN,\n\
                                    rid INT, mrid INT, mtime INT, pathname TEXT,\n\
                                    origname TEXT, mhash TEXT);",
            )
            .unwrap();
        ckout
            .execute(
                "INSERT INTO vvar(name, value) VALUES('repository', ?1)",
                [self.db_path.to_str().unwrap()],
            )
            .unwrap();
        ckout
            .execute(
                "INSERT INTO vvar(name, value) VALUES('checkout', ?1)",
                [rid.to_string()],
            )
            .unwrap();
        ckout
            .execute(
                "INSERT INTO vvar(name, value) VALUES('checkout-hash', ?1)",
                [uuid.as_str()],
            )
            .unwrap();

        let state = self.state.clone();
        let repo = self.repo();
        for (name, (_, blob_rid)) in &state {
            let path = dir.join(name);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            use fossick::repo::ScmRepo;
            let content = repo.content(*blob_rid).unwrap();
            fs::write(&path, content).unwrap();
            ckout
                .execute(
                    "INSERT INTO vfile(vid, chnged, deleted, isexe, islink, rid, mrid, \
                     mtime, pathname, origname, mhash) \
                     VALUES(?1, 0, 0, 0, 0, ?2, ?2, 0, ?3, NULL, NULL)",
                    rusqlite::params![rid, blob_rid, name],
                )
                .unwrap();
        }
        dir
    }
}
