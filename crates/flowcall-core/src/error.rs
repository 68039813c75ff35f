use thiserror::Error;

/// Input rejected before any network call is made.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("発話内容を入力してください")]
    EmptyUtterance,
    #[error("音声ファイルを選択してください")]
    MissingAudio,
    #[error("mp3 / wav / m4a / aac の音声ファイルを選択してください")]
    UnsupportedAudioFormat { file_name: String },
    #[error("トリガーフレーズを入力してください")]
    EmptyTriggerPhrase,
    #[error("成功トークを入力してください")]
    EmptyResponse,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("OpenAI API key is not configured.")]
    MissingApiKey,
    #[error("invalid bind address `{0}`")]
    InvalidBind(String),
    #[error("temperature must be between 0 and 2, got {0}")]
    InvalidTemperature(f32),
}
