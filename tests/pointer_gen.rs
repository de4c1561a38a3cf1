use rust_pointer_gen::pointer_gen::{
    BahdanauAttention, PointerGenConfig, PointerGenModel,
};
use rust_pointer_gen::RustPointerGenError;
use tch::{nn, Device, Tensor};

fn test_config() -> PointerGenConfig {
    PointerGenConfig {
        input_vocab_size: 32,
        output_vocab_size: 32,
        embedding_dim: 16,
        hidden_units: 16,
        batch_size: 2,
        bos_token_id: Some(0),
        eos_token_id: Some(1),
    }
}

fn test_model(config: &PointerGenConfig) -> (nn::VarStore, PointerGenModel) {
    tch::manual_seed(42);
    let vs = nn::VarStore::new(Device::Cpu);
    let model = PointerGenModel::new(vs.root(), config).unwrap();
    (vs, model)
}

fn test_source_ids() -> Tensor {
    Tensor::of_slice(&[2i64, 5, 9, 11, 3, 4, 7, 9, 2, 8]).view((2, 5))
}

#[test]
fn distributions_are_normalized() -> anyhow::Result<()> {
    let config = test_config();
    let (_vs, model) = test_model(&config);

    //    Encode and run one decode step
    let source_ids = test_source_ids();
    let encoder_output = model.encode(&source_ids)?;
    let state = model.begin_decode(&encoder_output)?;
    let prev_tokens = Tensor::of_slice(&[0i64, 0]);
    let decoder_output = model.decode_step(&prev_tokens, &encoder_output.hidden_states, state)?;

    //    Attention rows are non-negative and sum to 1
    assert_eq!(decoder_output.attention_weights.size(), vec![2, 5]);
    assert!(decoder_output.attention_weights.min().double_value(&[]) >= 0.0);
    let attention_sums = decoder_output
        .attention_weights
        .sum_dim_intlist([-1].as_slice(), false, tch::Kind::Float);
    for batch_index in 0..2 {
        assert!((attention_sums.double_value(&[batch_index]) - 1.0).abs() < 1e-5);
    }

    //    Vocabulary distribution rows sum to 1
    assert_eq!(decoder_output.vocab_distribution.size(), vec![2, 32]);
    let vocab_sums = decoder_output
        .vocab_distribution
        .sum_dim_intlist([-1].as_slice(), false, tch::Kind::Float);
    for batch_index in 0..2 {
        assert!((vocab_sums.double_value(&[batch_index]) - 1.0).abs() < 1e-5);
    }

    //    p_gen is a sigmoid output
    assert_eq!(decoder_output.p_gen.size(), vec![2, 1]);
    assert!(decoder_output.p_gen.min().double_value(&[]) > 0.0);
    assert!(decoder_output.p_gen.max().double_value(&[]) < 1.0);

    Ok(())
}

#[test]
fn coverage_starts_from_first_attention_distribution() -> anyhow::Result<()> {
    let config = test_config();
    let (_vs, model) = test_model(&config);

    let source_ids = test_source_ids();
    let encoder_output = model.encode(&source_ids)?;
    let state = model.begin_decode(&encoder_output)?;
    let prev_tokens = Tensor::of_slice(&[0i64, 0]);
    let decoder_output = model.decode_step(&prev_tokens, &encoder_output.hidden_states, state)?;

    //    The accumulator of the first step is that step's own attention distribution
    let coverage = decoder_output.state.coverage()?;
    assert!(coverage.allclose(&decoder_output.attention_weights, 1e-5, 1e-7, false));

    Ok(())
}

#[test]
fn coverage_accumulates_and_is_monotonic() -> anyhow::Result<()> {
    let config = test_config();
    let (_vs, model) = test_model(&config);

    let source_ids = test_source_ids();
    let encoder_output = model.encode(&source_ids)?;
    let state = model.begin_decode(&encoder_output)?;
    let prev_tokens = Tensor::of_slice(&[0i64, 0]);

    let step_1 = model.decode_step(&prev_tokens, &encoder_output.hidden_states, state)?;
    let coverage_1 = step_1.state.coverage()?.copy();

    let prev_tokens = Tensor::of_slice(&[3i64, 7]);
    let step_2 = model.decode_step(&prev_tokens, &encoder_output.hidden_states, step_1.state)?;
    let coverage_2 = step_2.state.coverage()?;

    //    coverage_2 = coverage_1 + attention_2, elementwise
    let expected = &coverage_1 + &step_2.attention_weights;
    assert!(coverage_2.allclose(&expected, 1e-5, 1e-7, false));

    //    Entries never decrease across steps
    let difference = coverage_2 - &coverage_1;
    assert!(difference.min().double_value(&[]) >= 0.0);

    Ok(())
}

#[test]
fn single_position_attention_is_one() -> anyhow::Result<()> {
    let mut config = test_config();
    config.batch_size = 1;
    let (_vs, model) = test_model(&config);

    //    A one-token source sequence: softmax over a single position
    let source_ids = Tensor::of_slice(&[4i64]).view((1, 1));
    let encoder_output = model.encode(&source_ids)?;
    let state = model.begin_decode(&encoder_output)?;
    let prev_tokens = Tensor::of_slice(&[0i64]);
    let decoder_output = model.decode_step(&prev_tokens, &encoder_output.hidden_states, state)?;

    assert_eq!(decoder_output.attention_weights.size(), vec![1, 1]);
    assert!((decoder_output.attention_weights.double_value(&[0, 0]) - 1.0).abs() < 1e-6);

    Ok(())
}

#[test]
fn encoder_is_deterministic_and_stateless() -> anyhow::Result<()> {
    let config = test_config();
    let (_vs, model) = test_model(&config);

    let source_ids = test_source_ids();
    let first_pass = model.encode(&source_ids)?;

    //    An unrelated sequence in between must not leak state into the next call
    let other_ids = Tensor::of_slice(&[1i64, 1, 1, 30, 30, 30]).view((2, 3));
    let _ = model.encode(&other_ids)?;

    let second_pass = model.encode(&source_ids)?;
    assert!(first_pass
        .hidden_states
        .allclose(&second_pass.hidden_states, 1e-10, 1e-12, false));
    assert!(first_pass
        .cell_state
        .allclose(&second_pass.cell_state, 1e-10, 1e-12, false));

    Ok(())
}

#[test]
fn decoding_is_independent_across_sessions() -> anyhow::Result<()> {
    let config = test_config();
    let (_vs, model) = test_model(&config);

    let source_ids = test_source_ids();
    let encoder_output = model.encode(&source_ids)?;
    let prev_tokens = Tensor::of_slice(&[0i64, 0]);

    //    First decode of a fresh session, before any other decoding happened
    let state = model.begin_decode(&encoder_output)?;
    let reference = model.decode_step(&prev_tokens, &encoder_output.hidden_states, state)?;

    //    Decode a few steps of another session on the same model instance
    let mut other_state = model.begin_decode(&encoder_output)?;
    for token in [5i64, 9, 2].iter() {
        let step_tokens = Tensor::of_slice(&[*token, *token]);
        let output = model.decode_step(&step_tokens, &encoder_output.hidden_states, other_state)?;
        other_state = output.state;
    }

    //    Replaying the first decode from a fresh session yields identical outputs
    let state = model.begin_decode(&encoder_output)?;
    let replay = model.decode_step(&prev_tokens, &encoder_output.hidden_states, state)?;
    assert!(reference
        .vocab_distribution
        .allclose(&replay.vocab_distribution, 1e-10, 1e-12, false));
    assert!(reference
        .attention_weights
        .allclose(&replay.attention_weights, 1e-10, 1e-12, false));
    assert!(reference.p_gen.allclose(&replay.p_gen, 1e-10, 1e-12, false));

    Ok(())
}

#[test]
fn context_vector_is_a_convex_combination() -> anyhow::Result<()> {
    let config = test_config();
    let (_vs, model) = test_model(&config);

    let source_ids = test_source_ids();
    let encoder_output = model.encode(&source_ids)?;
    let state = model.begin_decode(&encoder_output)?;
    let prev_tokens = Tensor::of_slice(&[0i64, 0]);
    let decoder_output = model.decode_step(&prev_tokens, &encoder_output.hidden_states, state)?;

    //    The context norm is bounded by the largest encoder state norm
    let context_vector = decoder_output.state.context_vector()?;
    for batch_index in 0..2 {
        let context_norm = context_vector.get(batch_index).norm().double_value(&[]);
        let mut max_row_norm = 0f64;
        for position in 0..5 {
            let row_norm = encoder_output
                .hidden_states
                .get(batch_index)
                .get(position)
                .norm()
                .double_value(&[]);
            max_row_norm = max_row_norm.max(row_norm);
        }
        assert!(context_norm <= max_row_norm + 1e-4);
    }

    Ok(())
}

#[test]
fn fresh_session_reports_uninitialized_state() -> anyhow::Result<()> {
    let config = test_config();
    let (_vs, model) = test_model(&config);

    let source_ids = test_source_ids();
    let encoder_output = model.encode(&source_ids)?;
    let state = model.begin_decode(&encoder_output)?;

    assert!(matches!(
        state.coverage(),
        Err(RustPointerGenError::UninitializedStateError(_))
    ));
    assert!(matches!(
        state.context_vector(),
        Err(RustPointerGenError::UninitializedStateError(_))
    ));

    Ok(())
}

#[test]
fn shape_and_vocabulary_violations_fail_fast() -> anyhow::Result<()> {
    let config = test_config();
    let (_vs, model) = test_model(&config);

    //    Wrong batch size
    let bad_batch = Tensor::of_slice(&[1i64, 2, 3]).view((3, 1));
    assert!(matches!(
        model.encode(&bad_batch),
        Err(RustPointerGenError::ShapeMismatchError(_))
    ));

    //    Wrong rank
    let bad_rank = Tensor::of_slice(&[1i64, 2, 3]);
    assert!(matches!(
        model.encode(&bad_rank),
        Err(RustPointerGenError::ShapeMismatchError(_))
    ));

    //    Out-of-vocabulary token index
    let out_of_bounds = Tensor::of_slice(&[1i64, 2, 3, 99, 1, 1]).view((2, 3));
    assert!(matches!(
        model.encode(&out_of_bounds),
        Err(RustPointerGenError::VocabularyLookupError(_))
    ));

    //    Batch mismatch between decoder inputs and session state
    let source_ids = test_source_ids();
    let encoder_output = model.encode(&source_ids)?;
    let state = model.begin_decode(&encoder_output)?;
    let bad_prev_tokens = Tensor::of_slice(&[0i64, 0, 0]);
    assert!(matches!(
        model.decode_step(&bad_prev_tokens, &encoder_output.hidden_states, state),
        Err(RustPointerGenError::ShapeMismatchError(_))
    ));

    Ok(())
}

#[test]
fn attention_rejects_mismatched_coverage() -> anyhow::Result<()> {
    let config = test_config();
    tch::manual_seed(42);
    let vs = nn::VarStore::new(Device::Cpu);
    let attention = BahdanauAttention::new(vs.root(), &config);

    let encoder_hidden_states = Tensor::rand(&[2, 5, 16], tch::kind::FLOAT_CPU);
    let cell_state = Tensor::rand(&[2, 16], tch::kind::FLOAT_CPU);

    //    Coverage of the wrong length is rejected before any computation
    let bad_coverage = Tensor::rand(&[2, 7], tch::kind::FLOAT_CPU);
    assert!(matches!(
        attention.forward(&encoder_hidden_states, &cell_state, Some(&bad_coverage)),
        Err(RustPointerGenError::ShapeMismatchError(_))
    ));

    //    A well-shaped call goes through
    let (context_vector, attention_weights, coverage) =
        attention.forward(&encoder_hidden_states, &cell_state, None)?;
    assert_eq!(context_vector.size(), vec![2, 16]);
    assert_eq!(attention_weights.size(), vec![2, 5]);
    assert!(coverage.allclose(&attention_weights, 1e-5, 1e-7, false));

    Ok(())
}

#[test]
fn final_distribution_blends_generation_and_copy() -> anyhow::Result<()> {
    let config = test_config();
    let (_vs, model) = test_model(&config);

    let source_ids = test_source_ids();
    let encoder_output = model.encode(&source_ids)?;
    let state = model.begin_decode(&encoder_output)?;
    let prev_tokens = Tensor::of_slice(&[0i64, 0]);
    let decoder_output = model.decode_step(&prev_tokens, &encoder_output.hidden_states, state)?;

    let final_distribution = model.final_distribution(&source_ids, &decoder_output)?;
    assert_eq!(final_distribution.size(), vec![2, 32]);

    //    Blending preserves normalization
    let sums = final_distribution.sum_dim_intlist([-1].as_slice(), false, tch::Kind::Float);
    for batch_index in 0..2 {
        assert!((sums.double_value(&[batch_index]) - 1.0).abs() < 1e-5);
    }

    //    Copying adds mass on top of the generation share for source tokens
    let p_gen = decoder_output.p_gen.double_value(&[0, 0]);
    let source_token = source_ids.int64_value(&[0, 0]);
    let generation_share =
        p_gen * decoder_output.vocab_distribution.double_value(&[0, source_token]);
    assert!(final_distribution.double_value(&[0, source_token]) > generation_share);

    //    Source indices outside the output vocabulary cannot be scattered
    let bad_decoder_state = model.begin_decode(&encoder_output)?;
    let bad_output = model.decode_step(
        &Tensor::of_slice(&[0i64, 0]),
        &encoder_output.hidden_states,
        bad_decoder_state,
    )?;
    let bad_source_ids = Tensor::of_slice(&[40i64, 5, 9, 11, 3, 4, 7, 9, 2, 8]).view((2, 5));
    assert!(matches!(
        model.final_distribution(&bad_source_ids, &bad_output),
        Err(RustPointerGenError::VocabularyLookupError(_))
    ));

    Ok(())
}

#[test]
fn greedy_generation_respects_max_length() -> anyhow::Result<()> {
    let config = test_config();
    let (_vs, model) = test_model(&config);

    let source_ids = test_source_ids();
    let generated = model.generate(&source_ids, 6)?;

    assert_eq!(generated.len(), 2);
    for sequence in &generated {
        assert!(sequence.len() <= 6);
        for token in sequence {
            assert!(*token >= 0 && *token < 32);
        }
    }

    Ok(())
}
