use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::sqlite::{format_timestamp, parse_timestamp};
use crate::db::DatabaseError;
use crate::models::ContextChunk;

pub fn insert_chunk(conn: &Connection, chunk: &ContextChunk) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO context_chunks (id, visit_id, chunk_index, text, embedding, dimension, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            chunk.id.to_string(),
            chunk.visit_id,
            chunk.chunk_index as i64,
            chunk.text,
            embedding_to_blob(&chunk.embedding),
            chunk.embedding.len() as i64,
            format_timestamp(&chunk.created_at),
        ],
    )?;
    Ok(())
}

/// Every chunk stored for a visit, in indexing order.
pub fn chunks_for_visit(conn: &Connection, visit_id: &str) -> Result<Vec<ContextChunk>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, visit_id, chunk_index, text, embedding, dimension, created_at
         FROM context_chunks WHERE visit_id = ?1
         ORDER BY created_at ASC, chunk_index ASC",
    )?;

    let rows = stmt.query_map(params![visit_id], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, i64>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, Vec<u8>>(4)?,
            row.get::<_, i64>(5)?,
            row.get::<_, String>(6)?,
        ))
    })?;

    let mut chunks = Vec::new();
    for row in rows {
        let (id, visit_id, chunk_index, text, blob, dimension, created_at) = row?;
        let embedding = blob_to_embedding(&blob)?;
        if embedding.len() as i64 != dimension {
            return Err(DatabaseError::ConstraintViolation(format!(
                "Chunk {id} declares dimension {dimension} but holds {}",
                embedding.len()
            )));
        }
        chunks.push(ContextChunk {
            id: Uuid::parse_str(&id)
                .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
            visit_id,
            chunk_index: chunk_index as usize,
            text,
            embedding,
            created_at: parse_timestamp(&created_at)?,
        });
    }
    Ok(chunks)
}

pub fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|v| v.to_le_bytes()).collect()
}

pub fn blob_to_embedding(blob: &[u8]) -> Result<Vec<f32>, DatabaseError> {
    if blob.len() % 4 != 0 {
        return Err(DatabaseError::ConstraintViolation(format!(
            "Embedding blob length {} is not a multiple of 4",
            blob.len()
        )));
    }
    Ok(blob
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}
