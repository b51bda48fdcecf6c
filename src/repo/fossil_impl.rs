// Copyright 2026 Thomas Johannesson
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use flate2::read::ZlibDecoder;
use rusqlite::{Connection, OpenFlags, OptionalExtension};

use crate::{ArtifactKind, ChangeKind, Commit, FileChange};

use super::deck::Deck;
use super::{
    delta, CheckoutInfo, RepoError, RepoResult, Resolved, ScmRepo, TimelineCursor,
    TimelineFilter, TimelinePage, VFileEntry,
};

/// Checkout database filenames searched during discovery.
const CHECKOUT_DB_NAMES: [&str; 2] = [".fslckout", "_FOSSIL_"];

/// Concrete repository backed by the SQLite repository database, plus the
/// checkout database when the repository was discovered through one.
///
/// Construct with [`FossilRepo::open`] or [`FossilRepo::discover`]; then
/// use through the [`ScmRepo`] trait.
pub struct FossilRepo {
    db: Mutex<Connection>,
    ckout: Option<CheckoutHandle>,
}

struct CheckoutHandle {
    db: Mutex<Connection>,
    info: CheckoutInfo,
}

impl FossilRepo {
    /// Open a repository database directly (no working checkout).
    pub fn open(repo_db: &Path) -> RepoResult<Self> {
        let db = open_readonly(repo_db)?;
        require_table(&db, "event")
            .map_err(|_| RepoError::Malformed(format!("{} is not a repository", repo_db.display())))?;
        Ok(FossilRepo {
            db: Mutex::new(db),
            ckout: None,
        })
    }

    /// Discover the repository through a checkout database found in `start`
    /// or one of its ancestors.
    pub fn discover(start: &Path) -> RepoResult<Self> {
        let (ckout_db_path, root) = find_checkout_db(start).ok_or_else(|| {
            RepoError::NotFound(format!(
                "no checkout found in {} or any parent directory",
                start.display()
            ))
        })?;
        let ckout_db = open_readonly(&ckout_db_path)?;

        let repo_path: String = ckout_db
            .query_row("SELECT value FROM vvar WHERE name = 'repository'", [], |r| {
                r.get(0)
            })
            .map_err(|_| RepoError::Malformed("checkout database names no repository".into()))?;
        let mut repo_db_path = PathBuf::from(&repo_path);
        if repo_db_path.is_relative() {
            repo_db_path = root.join(repo_db_path);
        }

        // vvar values are stored as text, including the checkout rid.
        let rid: i64 = ckout_db
            .query_row("SELECT value FROM vvar WHERE name = 'checkout'", [], |r| {
                r.get::<_, String>(0)
            })
            .ok()
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0);
        let hash: String = ckout_db
            .query_row(
                "SELECT value FROM vvar WHERE name = 'checkout-hash'",
                [],
                |r| r.get(0),
            )
            .unwrap_or_default();

        let mut repo = FossilRepo::open(&repo_db_path)?;
        repo.ckout = Some(CheckoutHandle {
            db: Mutex::new(ckout_db),
            info: CheckoutInfo { root, rid, hash },
        });
        Ok(repo)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.db.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Rid of a full artifact hash.
    fn rid_for_uuid(&self, uuid: &str) -> RepoResult<i64> {
        self.conn()
            .query_row("SELECT rid FROM blob WHERE uuid = ?1", [uuid], |r| r.get(0))
            .optional()?
            .ok_or_else(|| RepoError::NotFound(format!("artifact {uuid}")))
    }

    /// Raw (still compressed) blob record.
    fn raw_blob(&self, rid: i64) -> RepoResult<Vec<u8>> {
        let (content, size): (Vec<u8>, i64) = self
            .conn()
            .query_row(
                "SELECT content, size FROM blob WHERE rid = ?1",
                [rid],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()?
            .ok_or_else(|| RepoError::NotFound(format!("blob rid {rid}")))?;
        if size < 0 {
            return Err(RepoError::NotFound(format!("blob rid {rid} is a phantom")));
        }
        decompress(&content)
    }

    fn delta_source(&self, rid: i64) -> RepoResult<Option<i64>> {
        Ok(self
            .conn()
            .query_row("SELECT srcid FROM delta WHERE rid = ?1", [rid], |r| {
                r.get(0)
            })
            .optional()?)
    }

    fn primary_parent_hash(&self, rid: i64) -> RepoResult<Option<String>> {
        Ok(self
            .conn()
            .query_row(
                "SELECT blob.uuid FROM plink JOIN blob ON blob.rid = plink.pid \
                 WHERE plink.cid = ?1 AND plink.isprim",
                [rid],
                |r| r.get(0),
            )
            .optional()?)
    }

    /// Most recent event rid carrying the given symbolic tag.
    fn rid_for_tag(&self, tagname: &str) -> RepoResult<Option<i64>> {
        let conn = self.conn();
        let tagid: Option<i64> = conn
            .query_row(
                "SELECT tagid FROM tag WHERE tagname = ?1",
                [tagname],
                |r| r.get(0),
            )
            .optional()?;
        let Some(tagid) = tagid else {
            return Ok(None);
        };
        Ok(conn
            .query_row(
                "SELECT tagxref.rid FROM tagxref JOIN event ON event.objid = tagxref.rid \
                 WHERE tagxref.tagid = ?1 AND tagxref.tagtype > 0 \
                 ORDER BY event.mtime DESC LIMIT 1",
                [tagid],
                |r| r.get(0),
            )
            .optional()?)
    }

    fn hash_of_rid(&self, rid: i64) -> RepoResult<String> {
        self.conn()
            .query_row("SELECT uuid FROM blob WHERE rid = ?1", [rid], |r| r.get(0))
            .optional()?
            .ok_or_else(|| RepoError::NotFound(format!("blob rid {rid}")))
    }
}

impl ScmRepo for FossilRepo {
    fn timeline_page(
        &self,
        filter: &TimelineFilter,
        cursor: Option<TimelineCursor>,
        limit: usize,
    ) -> RepoResult<TimelinePage> {
        let mut sql = String::from(
            "SELECT blob.uuid, \
                    datetime(event.mtime{TZ}), \
                    coalesce(euser, user), \
                    event.objid, \
                    event.type, \
                    (SELECT group_concat(substr(tagname, 5), ',') \
                     FROM tag, tagxref WHERE tagname GLOB 'sym-*' \
                     AND tag.tagid = tagxref.tagid AND tagxref.rid = blob.rid \
                     AND tagxref.tagtype > 0), \
                    coalesce(ecomment, comment), \
                    event.mtime \
             FROM event JOIN blob ON blob.rid = event.objid",
        );
        sql = sql.replace("{TZ}", if filter.utc { "" } else { ", 'localtime'" });
        let mut conjuncts: Vec<String> = Vec::new();
        let mut params: Vec<String> = Vec::new();

        if !filter.kinds.is_empty() {
            let types: Vec<String> = filter
                .kinds
                .iter()
                .map(|k| format!("'{}'", k.event_type()))
                .collect();
            conjuncts.push(format!("event.type IN ({})", types.join(", ")));
        }
        for (name, err_label) in [
            (filter.branch.as_deref(), "branch"),
            (filter.tag.as_deref(), "tag"),
        ] {
            let Some(name) = name else { continue };
            let tagid = self.symbolic_tagid(name)?.ok_or_else(|| {
                RepoError::NotFound(format!("invalid {err_label} name [{name}]"))
            })?;
            conjuncts.push(format!(
                "EXISTS(SELECT 1 FROM tagxref WHERE tagid = {tagid} \
                 AND tagtype > 0 AND rid = blob.rid)"
            ));
        }
        if let Some(user) = &filter.user {
            conjuncts.push("lower(coalesce(euser, user)) GLOB ?".to_string());
            params.push(format!("*{}*", user.to_lowercase()));
        }
        if let Some(mtime) = filter.start_mtime {
            conjuncts.push(format!("event.mtime <= {mtime}"));
        }
        if let Some(path) = filter.path.as_deref().filter(|p| !p.is_empty()) {
            conjuncts.push(
                "EXISTS(SELECT 1 FROM mlink WHERE mlink.mid = event.objid \
                 AND mlink.fnid IN (SELECT fnid FROM filename \
                 WHERE name = ? OR name GLOB ?))"
                    .to_string(),
            );
            params.push(path.to_string());
            params.push(format!("{path}/*"));
        }
        if let Some(c) = cursor {
            conjuncts.push(format!(
                "(event.mtime < {m} OR (event.mtime = {m} AND event.objid < {r}))",
                m = c.mtime,
                r = c.rid
            ));
        }
        for (i, c) in conjuncts.iter().enumerate() {
            sql.push_str(if i == 0 { " WHERE " } else { " AND " });
            sql.push_str(c);
        }
        sql.push_str(" ORDER BY event.mtime DESC, event.objid DESC");
        sql.push_str(&format!(" LIMIT {limit}"));

        let rows: Vec<(Commit, f64)> = {
            let conn = self.conn();
            let mut stmt = conn.prepare(&sql)?;
            let mapped = stmt.query_map(rusqlite::params_from_iter(params.iter()), |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, Option<String>>(5)?,
                    row.get::<_, Option<String>>(6)?,
                    row.get::<_, f64>(7)?,
                ))
            })?;
            let mut rows = Vec::new();
            for row in mapped {
                let (hash, timestamp, user, rid, etype, branch, comment, mtime) = row?;
                let kind = ArtifactKind::from_event_type(&etype).ok_or_else(|| {
                    RepoError::Malformed(format!("unknown event type '{etype}'"))
                })?;
                rows.push((
                    Commit {
                        rid,
                        hash,
                        parent_hash: None,
                        user,
                        timestamp,
                        comment: decorate_comment(kind, comment.unwrap_or_default()),
                        branch: branch.filter(|b| !b.is_empty()),
                        kind,
                    },
                    mtime,
                ));
            }
            rows
        };

        let cursor = rows.last().map(|(c, mtime)| TimelineCursor {
            mtime: *mtime,
            rid: c.rid,
        });
        let mut commits = Vec::with_capacity(rows.len());
        for (mut commit, _) in rows {
            commit.parent_hash = self.primary_parent_hash(commit.rid)?;
            commits.push(commit);
        }
        Ok(TimelinePage { commits, cursor })
    }

    fn resolve(&self, symbol: &str) -> RepoResult<Resolved> {
        if symbol == "current" {
            let info = self
                .checkout()
                .ok_or_else(|| RepoError::NotFound("no open checkout".into()))?;
            return Ok(Resolved {
                rid: info.rid,
                hash: info.hash.clone(),
            });
        }
        if symbol == "tip" {
            let rid: Option<i64> = self
                .conn()
                .query_row(
                    "SELECT objid FROM event WHERE type = 'ci' \
                     ORDER BY mtime DESC, objid DESC LIMIT 1",
                    [],
                    |r| r.get(0),
                )
                .optional()?;
            let rid = rid.ok_or_else(|| RepoError::NotFound("repository has no checkins".into()))?;
            return Ok(Resolved {
                rid,
                hash: self.hash_of_rid(rid)?,
            });
        }
        if let Some(rid) = self.rid_for_tag(&format!("sym-{symbol}"))? {
            return Ok(Resolved {
                rid,
                hash: self.hash_of_rid(rid)?,
            });
        }
        if is_hex_prefix(symbol) {
            let matches: Vec<(i64, String)> = {
                let conn = self.conn();
                let mut stmt =
                    conn.prepare("SELECT rid, uuid FROM blob WHERE uuid GLOB ?1 LIMIT 2")?;
                let mapped = stmt.query_map([format!("{}*", symbol.to_lowercase())], |r| {
                    Ok((r.get(0)?, r.get(1)?))
                })?;
                mapped.collect::<Result<_, _>>()?
            };
            match matches.len() {
                1 => {
                    let (rid, hash) = matches.into_iter().next().expect("len checked");
                    return Ok(Resolved { rid, hash });
                }
                n if n > 1 => return Err(RepoError::Ambiguous(symbol.to_string())),
                _ => {}
            }
        }
        Err(RepoError::NotFound(symbol.to_string()))
    }

    fn commit(&self, rid: i64) -> RepoResult<Commit> {
        let row = self
            .conn()
            .query_row(
                "SELECT blob.uuid, datetime(event.mtime, 'localtime'), \
                        coalesce(euser, user), event.type, \
                        (SELECT group_concat(substr(tagname, 5), ',') \
                         FROM tag, tagxref WHERE tagname GLOB 'sym-*' \
                         AND tag.tagid = tagxref.tagid AND tagxref.rid = blob.rid \
                         AND tagxref.tagtype > 0), \
                        coalesce(ecomment, comment) \
                 FROM event JOIN blob ON blob.rid = event.objid \
                 WHERE event.objid = ?1",
                [rid],
                |r| {
                    Ok((
                        r.get::<_, String>(0)?,
                        r.get::<_, String>(1)?,
                        r.get::<_, String>(2)?,
                        r.get::<_, String>(3)?,
                        r.get::<_, Option<String>>(4)?,
                        r.get::<_, Option<String>>(5)?,
                    ))
                },
            )
            .optional()?
            .ok_or_else(|| RepoError::NotFound(format!("event for rid {rid}")))?;
        let (hash, timestamp, user, etype, branch, comment) = row;
        let kind = ArtifactKind::from_event_type(&etype)
            .ok_or_else(|| RepoError::Malformed(format!("unknown event type '{etype}'")))?;
        Ok(Commit {
            rid,
            hash,
            parent_hash: self.primary_parent_hash(rid)?,
            user,
            timestamp,
            comment: decorate_comment(kind, comment.unwrap_or_default()),
            branch: branch.filter(|b| !b.is_empty()),
            kind,
        })
    }

    fn event_mtime(&self, rid: i64) -> RepoResult<f64> {
        self.conn()
            .query_row("SELECT mtime FROM event WHERE objid = ?1", [rid], |r| {
                r.get(0)
            })
            .optional()?
            .ok_or_else(|| RepoError::NotFound(format!("event for rid {rid}")))
    }

    fn parent_of(&self, rid: i64) -> RepoResult<Option<Resolved>> {
        Ok(self
            .conn()
            .query_row(
                "SELECT plink.pid, blob.uuid FROM plink JOIN blob ON blob.rid = plink.pid \
                 WHERE plink.cid = ?1 AND plink.isprim",
                [rid],
                |r| {
                    Ok(Resolved {
                        rid: r.get(0)?,
                        hash: r.get(1)?,
                    })
                },
            )
            .optional()?)
    }

    fn changeset(&self, rid: i64) -> RepoResult<Vec<FileChange>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT filename.name, \
                    (SELECT uuid FROM blob WHERE rid = mlink.pid), \
                    (SELECT uuid FROM blob WHERE rid = mlink.fid), \
                    (SELECT name FROM filename f2 WHERE f2.fnid = mlink.pfnid) \
             FROM mlink JOIN filename ON filename.fnid = mlink.fnid \
             WHERE mlink.mid = ?1 AND NOT mlink.isaux \
             AND (mlink.fid > 0 \
                  OR mlink.fnid NOT IN (SELECT pfnid FROM mlink WHERE mid = ?1)) \
             ORDER BY filename.name",
        )?;
        let mapped = stmt.query_map([rid], |r| {
            Ok((
                r.get::<_, String>(0)?,
                r.get::<_, Option<String>>(1)?,
                r.get::<_, Option<String>>(2)?,
                r.get::<_, Option<String>>(3)?,
            ))
        })?;
        let mut changes = Vec::new();
        for row in mapped {
            let (name, old_uuid, new_uuid, prior_name) = row?;
            let kind = if new_uuid.is_none() {
                ChangeKind::Removed
            } else if old_uuid.is_none() {
                ChangeKind::Added
            } else if prior_name.is_some() {
                ChangeKind::Renamed
            } else {
                ChangeKind::Modified
            };
            changes.push(FileChange {
                name,
                prior_name,
                old_uuid,
                new_uuid,
                kind,
            });
        }
        Ok(changes)
    }

    fn deck(&self, rid: i64) -> RepoResult<Deck> {
        let text = artifact_text(self.content(rid)?)?;
        let mut deck = Deck::parse(&text)?;
        if let Some(baseline_uuid) = deck.baseline.clone() {
            let base_rid = self.rid_for_uuid(&baseline_uuid)?;
            let base_text = artifact_text(self.content(base_rid)?)?;
            let base = Deck::parse(&base_text)?;
            if base.baseline.is_some() {
                return Err(RepoError::Malformed(format!(
                    "baseline {baseline_uuid} is itself a delta manifest"
                )));
            }
            deck.fcards = deck.effective_fcards(Some(&base));
        } else {
            deck.fcards = deck.effective_fcards(None);
        }
        Ok(deck)
    }

    fn content(&self, rid: i64) -> RepoResult<Vec<u8>> {
        // Collect the delta chain down to its base, then apply upward.
        let mut chain = Vec::new();
        let mut cur = rid;
        while let Some(src) = self.delta_source(cur)? {
            chain.push(cur);
            cur = src;
            if chain.len() > 10_000 {
                return Err(RepoError::Malformed(format!(
                    "delta chain for rid {rid} does not terminate"
                )));
            }
        }
        let mut content = self.raw_blob(cur)?;
        for &link in chain.iter().rev() {
            let d = self.raw_blob(link)?;
            content = delta::apply(&content, &d)?;
        }
        Ok(content)
    }

    fn content_by_uuid(&self, uuid: &str) -> RepoResult<Vec<u8>> {
        let rid = self.rid_for_uuid(uuid)?;
        self.content(rid)
    }

    fn root_commit(&self) -> RepoResult<String> {
        let main_branch: String = self
            .conn()
            .query_row(
                "SELECT value FROM config WHERE name = 'main-branch'",
                [],
                |r| r.get(0),
            )
            .optional()?
            .unwrap_or_else(|| "trunk".to_string());
        let from_branch: Option<String> = self
            .conn()
            .query_row(
                "SELECT blob.uuid FROM tagxref \
                 JOIN event ON event.objid = tagxref.rid \
                 JOIN blob ON blob.rid = tagxref.rid \
                 WHERE tagxref.tagid = (SELECT tagid FROM tag WHERE tagname = ?1) \
                 AND tagxref.tagtype > 0 AND event.type = 'ci' \
                 ORDER BY event.mtime ASC, event.objid ASC LIMIT 1",
                [format!("sym-{main_branch}")],
                |r| r.get(0),
            )
            .optional()?;
        if let Some(uuid) = from_branch {
            return Ok(uuid);
        }
        self.conn()
            .query_row(
                "SELECT blob.uuid FROM event JOIN blob ON blob.rid = event.objid \
                 WHERE event.type = 'ci' ORDER BY event.mtime ASC, event.objid ASC LIMIT 1",
                [],
                |r| r.get(0),
            )
            .optional()?
            .ok_or_else(|| RepoError::NotFound("repository has no checkins".into()))
    }

    fn checkout(&self) -> Option<&CheckoutInfo> {
        self.ckout.as_ref().map(|c| &c.info)
    }

    fn vfile_entries(&self) -> RepoResult<Vec<VFileEntry>> {
        let ckout = self
            .ckout
            .as_ref()
            .ok_or_else(|| RepoError::NotFound("no open checkout".into()))?;
        let rows: Vec<(String, Option<String>, i64, bool, i64, bool, bool)> = {
            let conn = ckout.db.lock().unwrap_or_else(|e| e.into_inner());
            let mut stmt = conn.prepare(
                "SELECT pathname, origname, rid, deleted, chnged, isexe, islink \
                 FROM vfile WHERE vid = ?1 ORDER BY pathname",
            )?;
            let mapped = stmt.query_map([ckout.info.rid], |r| {
                Ok((
                    r.get(0)?,
                    r.get(1)?,
                    r.get(2)?,
                    r.get(3)?,
                    r.get(4)?,
                    r.get(5)?,
                    r.get(6)?,
                ))
            })?;
            mapped.collect::<Result<_, _>>()?
        };
        let mut entries = Vec::with_capacity(rows.len());
        for (pathname, orig_name, rid, deleted, changed, is_exe, is_link) in rows {
            let uuid = if rid > 0 {
                Some(self.hash_of_rid(rid)?)
            } else {
                None
            };
            entries.push(VFileEntry {
                pathname,
                orig_name,
                uuid,
                deleted,
                changed,
                is_exe,
                is_link,
            });
        }
        Ok(entries)
    }
}

impl FossilRepo {
    /// Tagid of `sym-<name>`, falling back to the bare tag name (for
    /// non-propagating tags queried with `-T`).
    fn symbolic_tagid(&self, name: &str) -> RepoResult<Option<i64>> {
        let conn = self.conn();
        for candidate in [format!("sym-{name}"), name.to_string()] {
            let tagid: Option<i64> = conn
                .query_row(
                    "SELECT tagid FROM tag WHERE tagname = ?1",
                    [candidate],
                    |r| r.get(0),
                )
                .optional()?;
            if tagid.is_some() {
                return Ok(tagid);
            }
        }
        Ok(None)
    }
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn open_readonly(path: &Path) -> RepoResult<Connection> {
    Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(RepoError::from)
}

fn require_table(db: &Connection, name: &str) -> RepoResult<()> {
    let found: Option<String> = db
        .query_row(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [name],
            |r| r.get(0),
        )
        .optional()?;
    found
        .map(|_| ())
        .ok_or_else(|| RepoError::NotFound(format!("table {name}")))
}

fn find_checkout_db(start: &Path) -> Option<(PathBuf, PathBuf)> {
    let mut dir = start.to_path_buf();
    loop {
        for name in CHECKOUT_DB_NAMES {
            let candidate = dir.join(name);
            if candidate.is_file() {
                return Some((candidate, dir));
            }
        }
        if !dir.pop() {
            return None;
        }
    }
}

/// Blob records are a 4-byte big-endian uncompressed size followed by a
/// zlib stream.
fn decompress(raw: &[u8]) -> RepoResult<Vec<u8>> {
    if raw.len() < 4 {
        return Err(RepoError::Malformed("blob record shorter than its header".into()));
    }
    let size = u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]) as usize;
    let mut out = Vec::with_capacity(size);
    ZlibDecoder::new(&raw[4..]).read_to_end(&mut out)?;
    if out.len() != size {
        return Err(RepoError::Malformed(format!(
            "blob inflated to {} bytes, header claims {}",
            out.len(),
            size
        )));
    }
    Ok(out)
}

fn artifact_text(content: Vec<u8>) -> RepoResult<String> {
    String::from_utf8(content)
        .map_err(|_| RepoError::Malformed("artifact is not valid UTF-8".into()))
}

fn is_hex_prefix(s: &str) -> bool {
    (4..=64).contains(&s.len()) && s.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Wiki event comments carry a leading op character; expand it to the
/// human-readable prefix.
fn decorate_comment(kind: ArtifactKind, comment: String) -> String {
    if kind != ArtifactKind::Wiki {
        return comment;
    }
    match comment.as_bytes().first() {
        Some(b'+') => format!("Added: {}", &comment[1..]),
        Some(b'-') => format!("Deleted: {}", &comment[1..]),
        Some(b':') => format!("Edited: {}", &comment[1..]),
        _ => comment,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_prefix_bounds() {
        assert!(is_hex_prefix("abcd"));
        assert!(is_hex_prefix(&"a".repeat(64)));
        assert!(!is_hex_prefix("abc"));
        assert!(!is_hex_prefix(&"a".repeat(65)));
        assert!(!is_hex_prefix("abcz"));
    }

    #[test]
    fn wiki_comments_gain_prefixes() {
        assert_eq!(
            decorate_comment(ArtifactKind::Wiki, "+Home".into()),
            "Added: Home"
        );
        assert_eq!(
            decorate_comment(ArtifactKind::Wiki, ":Home".into()),
            "Edited: Home"
        );
        assert_eq!(
            decorate_comment(ArtifactKind::Wiki, "-Home".into()),
            "Deleted: Home"
        );
        assert_eq!(
            decorate_comment(ArtifactKind::Checkin, "+keep".into()),
            "+keep"
        );
    }

    #[test]
    fn decompress_rejects_short_and_mismatched_records() {
        assert!(decompress(&[0, 0]).is_err());

        let payload = b"some artifact text";
        let mut record = (payload.len() as u32).to_be_bytes().to_vec();
        let mut enc =
            flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        std::io::Write::write_all(&mut enc, payload).unwrap();
        record.extend_from_slice(&enc.finish().unwrap());
        assert_eq!(decompress(&record).unwrap(), payload);

        // Corrupt the declared size.
        record[3] = record[3].wrapping_add(1);
        assert!(decompress(&record).is_err());
    }
}
