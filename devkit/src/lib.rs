/*!
# co2-collector DevKit - Stubs et utilitaires de test

Bibliothèque facilitant les tests du collecteur avec:
- Stub de l'API co2signal (réponses scriptées, requêtes enregistrées)
- Builders de réponses JSON conformes à l'API
- Harness avec répertoire de sortie temporaire et assertions sur les séries CSV
*/

pub mod api_stub;
pub mod responses;
pub mod test_utils;

pub use api_stub::{StubApi, StubReply};
pub use responses::ResponseBuilder;
pub use test_utils::TestHarness;
